//! Kanban board with optimistic status moves.
//!
//! A move is applied to the local column order and the task cache at once,
//! then confirmed or rolled back when the remote `PATCH` settles. Rollback
//! restores the task's status through the cache undo handle; the column
//! placement chosen by the user stays where it was dropped until the next
//! refresh regroups the board.

use std::collections::{HashMap, VecDeque};

use crate::api::{fetch_all_tasks, TaskApi, TaskListParams};
use crate::cache::{Compensate, TaskCache, UndoHandle};
use crate::error::{ApiError, BoardError};
use crate::fields::Status;
use crate::filter::TaskFilter;
use crate::task::{Task, TaskPatch};

/// Task ids per status column, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnOrder {
    columns: [Vec<u64>; 3],
}

impl ColumnOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(&self, status: Status) -> &[u64] {
        &self.columns[status.column()]
    }

    /// Column and index of a task, if it is on the board.
    pub fn position(&self, task_id: u64) -> Option<(Status, usize)> {
        Status::ALL.iter().find_map(|&status| {
            self.column(status)
                .iter()
                .position(|&id| id == task_id)
                .map(|idx| (status, idx))
        })
    }

    /// Reconcile with a fresh (filtered) listing.
    ///
    /// Ids still present in their status column keep their place, new ones
    /// are appended in arrival order, everything else is pruned.
    pub fn sync_with<'a>(&mut self, tasks: impl IntoIterator<Item = &'a Task>) {
        let mut incoming: [Vec<u64>; 3] = Default::default();
        for task in tasks {
            incoming[task.status.column()].push(task.id);
        }
        for (column, fresh) in self.columns.iter_mut().zip(incoming) {
            let mut next: Vec<u64> = column.iter().copied().filter(|id| fresh.contains(id)).collect();
            for id in fresh {
                if !next.contains(&id) {
                    next.push(id);
                }
            }
            *column = next;
        }
    }

    /// Remove the task from wherever it sits and insert it into `to` at
    /// `index`, clamped to the column length.
    pub fn apply_move(&mut self, task_id: u64, to: Status, index: usize) {
        for column in self.columns.iter_mut() {
            column.retain(|&id| id != task_id);
        }
        let target = &mut self.columns[to.column()];
        let index = index.min(target.len());
        target.insert(index, task_id);
    }
}

/// A drag gesture: put `task_id` into column `to` at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub task_id: u64,
    pub from: Status,
    pub to: Status,
    pub index: usize,
}

impl Compensate for ColumnOrder {
    type Mutation = Move;
    type Inverse = ColumnOrder;

    fn apply(&mut self, mv: Move) -> ColumnOrder {
        let snapshot = self.clone();
        self.apply_move(mv.task_id, mv.to, mv.index);
        snapshot
    }

    fn revert(&mut self, snapshot: ColumnOrder) {
        *self = snapshot;
    }
}

/// Lifecycle of a task's latest move.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveState {
    Idle,
    /// Applied locally, waiting for the server.
    Applied { patch: TaskPatch, undo: UndoHandle },
    Committed,
    RolledBack { error: String },
}

/// Remote half of a move, handed to whoever runs the request.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteUpdate {
    pub task_id: u64,
    pub patch: TaskPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Re-apply the patches of moves still waiting for the server on top of a
/// fresh listing, so a refresh never shows a pending task in its old state.
///
/// The undo handles are retaken against the fresh records.
pub(crate) fn reapply_pending(cache: &mut TaskCache, states: &mut HashMap<u64, MoveState>) {
    for (&task_id, state) in states.iter_mut() {
        if let MoveState::Applied { patch, undo } = state {
            *undo = cache.patch(task_id, patch);
        }
    }
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct KanbanBoard {
    cache: TaskCache,
    order: ColumnOrder,
    filter: TaskFilter,
    states: HashMap<u64, MoveState>,
    notices: VecDeque<Notice>,
}

impl KanbanBoard {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut board = KanbanBoard {
            cache: TaskCache::new(tasks),
            order: ColumnOrder::new(),
            filter: TaskFilter::default(),
            states: HashMap::new(),
            notices: VecDeque::new(),
        };
        board.resync();
        board
    }

    /// Fetch every page of `params` and rebuild the board from it.
    pub async fn load(api: &dyn TaskApi, params: &TaskListParams) -> Result<Self, ApiError> {
        Ok(Self::new(fetch_all_tasks(api, params).await?))
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    pub fn order(&self) -> &ColumnOrder {
        &self.order
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
        self.resync();
    }

    /// Swap in a refetched listing. Local order survives for known ids and
    /// pending moves stay applied.
    pub fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.cache.replace_all(tasks);
        reapply_pending(&mut self.cache, &mut self.states);
        self.resync();
    }

    pub async fn refresh(&mut self, api: &dyn TaskApi, params: &TaskListParams) -> Result<(), ApiError> {
        let tasks = fetch_all_tasks(api, params).await?;
        self.replace_tasks(tasks);
        Ok(())
    }

    fn resync(&mut self) {
        let visible = self.filter.apply(self.cache.tasks());
        self.order.sync_with(visible);
    }

    /// Tasks of one column in display order.
    pub fn column_tasks(&self, status: Status) -> Vec<&Task> {
        self.order
            .column(status)
            .iter()
            .filter_map(|&id| self.cache.get(id))
            .collect()
    }

    pub fn state(&self, task_id: u64) -> &MoveState {
        self.states.get(&task_id).unwrap_or(&MoveState::Idle)
    }

    pub fn is_in_flight(&self, task_id: u64) -> bool {
        matches!(self.states.get(&task_id), Some(MoveState::Applied { .. }))
    }

    pub fn in_flight_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, MoveState::Applied { .. }))
            .count()
    }

    /// Apply a move locally.
    ///
    /// Returns the request to send when the move changes the task's status,
    /// `None` for reorders within a column and for no-op drops.
    pub fn begin_move(&mut self, mv: Move) -> Result<Option<RemoteUpdate>, BoardError> {
        let (current, current_idx) = self
            .order
            .position(mv.task_id)
            .ok_or(BoardError::UnknownTask(mv.task_id))?;
        if self.is_in_flight(mv.task_id) {
            return Err(BoardError::MoveInFlight(mv.task_id));
        }
        if current == mv.to && current_idx == mv.index {
            return Ok(None);
        }
        if current != mv.from {
            tracing::debug!(task_id = mv.task_id, from = %mv.from, actual = %current, "stale move source");
        }

        self.order.apply_move(mv.task_id, mv.to, mv.index);
        if current == mv.to {
            return Ok(None);
        }

        let patch = TaskPatch::status(mv.to);
        let undo = self.cache.patch(mv.task_id, &patch);
        tracing::debug!(task_id = mv.task_id, from = %current, to = %mv.to, "move applied locally");
        self.states.insert(
            mv.task_id,
            MoveState::Applied {
                patch: patch.clone(),
                undo,
            },
        );
        Ok(Some(RemoteUpdate {
            task_id: mv.task_id,
            patch,
        }))
    }

    /// Settle a move with the server's answer.
    ///
    /// Completions for tasks without a pending move are ignored.
    pub fn finish(&mut self, task_id: u64, result: Result<Task, ApiError>) -> Result<(), BoardError> {
        let undo = match self.states.remove(&task_id) {
            Some(MoveState::Applied { undo, .. }) => undo,
            other => {
                if let Some(state) = other {
                    self.states.insert(task_id, state);
                }
                tracing::debug!(task_id, "completion without pending move ignored");
                return Ok(());
            }
        };

        match result {
            Ok(task) => {
                tracing::info!(task_id, status = %task.status, "move committed");
                self.cache.upsert(task);
                self.states.insert(task_id, MoveState::Committed);
                self.resync();
                Ok(())
            }
            Err(source) => {
                tracing::warn!(task_id, error = %source, "move rejected, rolling back");
                self.cache.undo(undo);
                let message = format!("Could not move task {task_id}: {source}");
                self.notices.push_back(Notice {
                    level: NoticeLevel::Error,
                    message,
                });
                self.states.insert(
                    task_id,
                    MoveState::RolledBack {
                        error: source.to_string(),
                    },
                );
                Err(BoardError::Remote { task_id, source })
            }
        }
    }

    /// Apply a move and wait for the server.
    pub async fn move_task(&mut self, api: &dyn TaskApi, mv: Move) -> Result<(), BoardError> {
        let Some(update) = self.begin_move(mv)? else {
            return Ok(());
        };
        let result = api.update_task(update.task_id, &update.patch).await;
        self.finish(update.task_id, result)
    }

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push_back(Notice {
            level,
            message: message.into(),
        });
    }

    /// Drain queued notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_api::MemoryApi;
    use crate::task::tests::task;

    fn mv(task_id: u64, from: Status, to: Status, index: usize) -> Move {
        Move { task_id, from, to, index }
    }

    #[test]
    fn test_sync_appends_prunes_and_keeps_order() {
        let mut order = ColumnOrder::new();
        let tasks = vec![task(1, Status::Todo), task(2, Status::Todo), task(3, Status::Doing)];
        order.sync_with(&tasks);
        order.apply_move(2, Status::Todo, 0);
        assert_eq!(order.column(Status::Todo), &[2, 1]);

        let tasks = vec![task(1, Status::Todo), task(2, Status::Todo), task(4, Status::Todo), task(4, Status::Todo)];
        order.sync_with(&tasks);
        assert_eq!(order.column(Status::Todo), &[2, 1, 4]);
        assert!(order.column(Status::Doing).is_empty());
    }

    #[test]
    fn test_apply_move_clamps_index() {
        let mut order = ColumnOrder::new();
        order.sync_with(&[task(1, Status::Todo), task(2, Status::Doing)]);
        order.apply_move(1, Status::Doing, 99);
        assert_eq!(order.column(Status::Doing), &[2, 1]);
        assert_eq!(order.position(1), Some((Status::Doing, 1)));
    }

    #[test]
    fn test_column_order_compensates() {
        let mut order = ColumnOrder::new();
        order.sync_with(&[task(1, Status::Todo), task(2, Status::Doing)]);
        let before = order.clone();
        let snapshot = order.apply(mv(1, Status::Todo, Status::Done, 0));
        assert_eq!(order.column(Status::Done), &[1]);
        order.revert(snapshot);
        assert_eq!(order, before);
    }

    #[test]
    fn test_cross_column_move_patches_status() {
        let mut board = KanbanBoard::new(vec![task(1, Status::Todo), task(2, Status::Doing)]);
        let update = board.begin_move(mv(1, Status::Todo, Status::Doing, 0)).unwrap().unwrap();
        assert_eq!(update.patch, TaskPatch::status(Status::Doing));
        assert!(board.order().column(Status::Todo).is_empty());
        assert_eq!(board.order().column(Status::Doing), &[1, 2]);
        assert_eq!(board.cache().get(1).unwrap().status, Status::Doing);
        assert!(board.is_in_flight(1));

        let err = board.begin_move(mv(1, Status::Doing, Status::Done, 0)).unwrap_err();
        assert!(matches!(err, BoardError::MoveInFlight(1)));
    }

    #[test]
    fn test_same_column_reorder_is_local() {
        let mut board = KanbanBoard::new(vec![task(1, Status::Todo), task(2, Status::Todo)]);
        assert!(board.begin_move(mv(2, Status::Todo, Status::Todo, 0)).unwrap().is_none());
        assert_eq!(board.order().column(Status::Todo), &[2, 1]);
        assert_eq!(*board.state(2), MoveState::Idle);

        // Dropping where it already is changes nothing.
        assert!(board.begin_move(mv(2, Status::Todo, Status::Todo, 0)).unwrap().is_none());
        assert_eq!(board.order().column(Status::Todo), &[2, 1]);
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        let mut board = KanbanBoard::new(vec![task(1, Status::Todo)]);
        let err = board.begin_move(mv(9, Status::Todo, Status::Done, 0)).unwrap_err();
        assert!(matches!(err, BoardError::UnknownTask(9)));
    }

    #[test]
    fn test_failed_move_restores_status_but_not_placement() {
        let mut board = KanbanBoard::new(vec![task(1, Status::Todo), task(2, Status::Doing)]);
        board.begin_move(mv(1, Status::Todo, Status::Doing, 0)).unwrap();
        let err = board.finish(1, Err(ApiError::NotFound(1))).unwrap_err();
        assert!(matches!(err, BoardError::Remote { task_id: 1, .. }));

        assert_eq!(board.cache().get(1).unwrap().status, Status::Todo);
        assert_eq!(board.order().column(Status::Doing), &[1, 2]);
        assert!(matches!(board.state(1), MoveState::RolledBack { .. }));
        let notices = board.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(board.take_notices().is_empty());

        // A refresh regroups the task by its restored status.
        let tasks = board.cache().tasks().to_vec();
        board.replace_tasks(tasks);
        assert_eq!(board.order().column(Status::Todo), &[1]);
    }

    #[test]
    fn test_success_stores_server_record() {
        let mut board = KanbanBoard::new(vec![task(1, Status::Todo)]);
        board.begin_move(mv(1, Status::Todo, Status::Done, 0)).unwrap();
        let mut server = task(1, Status::Done);
        server.title = "Renamed on server".into();
        board.finish(1, Ok(server)).unwrap();
        assert_eq!(board.cache().get(1).unwrap().title, "Renamed on server");
        assert_eq!(*board.state(1), MoveState::Committed);

        // Late duplicate completions are ignored.
        board.finish(1, Err(ApiError::NotFound(1))).unwrap();
        assert_eq!(board.cache().get(1).unwrap().status, Status::Done);
    }

    #[test]
    fn test_filter_prunes_and_restores_columns() {
        let mut a = task(1, Status::Todo);
        a.title = "Buy lumber".into();
        let mut board = KanbanBoard::new(vec![a, task(2, Status::Todo)]);
        board.set_filter(TaskFilter {
            search: "lumber".into(),
            ..Default::default()
        });
        assert_eq!(board.order().column(Status::Todo), &[1]);
        assert!(board.begin_move(mv(2, Status::Todo, Status::Done, 0)).is_err());

        board.set_filter(TaskFilter::default());
        assert_eq!(board.column_tasks(Status::Todo).len(), 2);
    }

    #[test]
    fn test_refresh_during_pending_move_keeps_it_applied() {
        let mut board = KanbanBoard::new(vec![task(1, Status::Todo), task(2, Status::Doing)]);
        board.begin_move(mv(1, Status::Todo, Status::Doing, 0)).unwrap();

        // The listing still has the pre-move status.
        board.replace_tasks(vec![task(1, Status::Todo), task(2, Status::Doing)]);
        assert_eq!(board.cache().get(1).unwrap().status, Status::Doing);
        assert_eq!(board.order().position(1), Some((Status::Doing, 0)));
        assert!(board.is_in_flight(1));

        board.finish(1, Ok(task(1, Status::Doing))).unwrap();
        assert_eq!(*board.state(1), MoveState::Committed);
        assert_eq!(board.order().position(1).map(|(s, _)| s), Some(Status::Doing));
        assert!(board.order().column(Status::Todo).is_empty());
    }

    #[test]
    fn test_rejection_after_refresh_restores_refreshed_status() {
        let mut board = KanbanBoard::new(vec![task(1, Status::Todo)]);
        board.begin_move(mv(1, Status::Todo, Status::Done, 0)).unwrap();
        let mut fresh = task(1, Status::Todo);
        fresh.title = "Edited elsewhere".into();
        board.replace_tasks(vec![fresh]);
        assert_eq!(board.cache().get(1).unwrap().status, Status::Done);

        assert!(board.finish(1, Err(ApiError::NotFound(1))).is_err());
        let cached = board.cache().get(1).unwrap();
        assert_eq!(cached.status, Status::Todo);
        assert_eq!(cached.title, "Edited elsewhere");
    }

    #[test]
    fn test_commit_regroups_by_server_status() {
        let mut board = KanbanBoard::new(vec![task(1, Status::Todo), task(2, Status::Todo)]);
        board.begin_move(mv(1, Status::Todo, Status::Doing, 0)).unwrap();
        // The server settled on a different status than requested.
        board.finish(1, Ok(task(1, Status::Done))).unwrap();
        assert_eq!(board.order().column(Status::Done), &[1]);
        assert!(board.order().column(Status::Doing).is_empty());
    }

    #[tokio::test]
    async fn test_move_task_against_memory_api() {
        let api = MemoryApi::new(vec![task(1, Status::Todo), task(2, Status::Todo)]);
        api.fail_updates_for(2).await;
        let mut board = KanbanBoard::load(&api, &TaskListParams::for_project(1)).await.unwrap();

        board.move_task(&api, mv(1, Status::Todo, Status::Done, 0)).await.unwrap();
        assert!(board.move_task(&api, mv(2, Status::Todo, Status::Doing, 0)).await.is_err());

        let stored = api.snapshot().await;
        assert_eq!(stored[0].status, Status::Done);
        assert_eq!(stored[1].status, Status::Todo);
        assert_eq!(board.cache().get(2).unwrap().status, Status::Todo);
        assert_eq!(api.updates().await.len(), 2);
    }
}
