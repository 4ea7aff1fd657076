//! In-memory cache of a fetched task listing.
//!
//! The boards read tasks from here and patch them optimistically. Every patch
//! hands back an [`UndoHandle`]; reverting it restores only the fields that the
//! patch touched, so a rollback never clobbers unrelated fields refreshed in
//! the meantime.

use crate::task::{Task, TaskPatch};

/// A state change that can be compensated.
///
/// `apply` performs the mutation and returns its inverse; `revert` applies
/// that inverse.
pub trait Compensate {
    type Mutation;
    type Inverse;

    fn apply(&mut self, mutation: Self::Mutation) -> Self::Inverse;

    fn revert(&mut self, inverse: Self::Inverse);
}

/// Restores the pre-patch values of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoHandle {
    pub task_id: u64,
    inverse: TaskPatch,
}

impl UndoHandle {
    /// True when the patch found nothing to change.
    pub fn is_noop(&self) -> bool {
        self.inverse.is_empty()
    }
}

/// Fetched tasks for one query, in server order.
#[derive(Debug, Clone, Default)]
pub struct TaskCache {
    tasks: Vec<Task>,
}

impl TaskCache {
    pub fn new(tasks: Vec<Task>) -> Self {
        TaskCache { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Replace the whole listing with a fresh fetch.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Store a record returned by the server, replacing any cached copy.
    pub fn upsert(&mut self, task: Task) {
        match self.get_mut(task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    pub fn remove(&mut self, id: u64) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(idx))
    }

    /// Patch a cached task and return the handle that undoes it.
    pub fn patch(&mut self, task_id: u64, patch: &TaskPatch) -> UndoHandle {
        let inverse = match self.get_mut(task_id) {
            Some(task) => patch.apply_to(task),
            None => TaskPatch::default(),
        };
        UndoHandle { task_id, inverse }
    }

    pub fn undo(&mut self, handle: UndoHandle) {
        if let Some(task) = self.get_mut(handle.task_id) {
            handle.inverse.apply_to(task);
        } else {
            tracing::debug!(task_id = handle.task_id, "undo skipped, task no longer cached");
        }
    }
}

impl Compensate for TaskCache {
    type Mutation = (u64, TaskPatch);
    type Inverse = UndoHandle;

    fn apply(&mut self, (task_id, patch): Self::Mutation) -> UndoHandle {
        self.patch(task_id, &patch)
    }

    fn revert(&mut self, inverse: UndoHandle) {
        self.undo(inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Status;
    use crate::task::tests::task;

    #[test]
    fn test_patch_and_undo_round_trip() {
        let mut cache = TaskCache::new(vec![task(1, Status::Todo), task(2, Status::Doing)]);
        let handle = cache.apply((1, TaskPatch::status(Status::Done)));
        assert_eq!(cache.get(1).unwrap().status, Status::Done);
        assert!(!handle.is_noop());

        cache.revert(handle);
        assert_eq!(cache.get(1).unwrap().status, Status::Todo);
        assert_eq!(cache.get(2).unwrap().status, Status::Doing);
    }

    #[test]
    fn test_patch_unknown_task_is_noop() {
        let mut cache = TaskCache::new(vec![task(1, Status::Todo)]);
        let handle = cache.patch(99, &TaskPatch::status(Status::Done));
        assert!(handle.is_noop());
        cache.undo(handle);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut cache = TaskCache::new(vec![task(1, Status::Todo)]);
        let mut updated = task(1, Status::Done);
        updated.title = "Server copy".into();
        cache.upsert(updated);
        cache.upsert(task(5, Status::Todo));
        assert_eq!(cache.get(1).unwrap().title, "Server copy");
        assert_eq!(cache.tasks()[1].id, 5);
        assert!(cache.remove(1).is_some());
        assert!(cache.remove(1).is_none());
    }
}
