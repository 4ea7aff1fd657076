//! Client-side task filters shared by the kanban and timeline views.

use crate::fields::*;
use crate::task::Task;

/// Search text plus status and priority selections. Empty selections match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub search: String,
    pub statuses: Vec<Status>,
    pub priorities: Vec<Priority>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.search.trim().is_empty() && self.statuses.is_empty() && self.priorities.is_empty()
    }

    pub fn matches(&self, task: &Task) -> bool {
        let query = self.search.trim().to_lowercase();
        if !query.is_empty() && !task.title.to_lowercase().contains(&query) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }
        true
    }

    /// Matching tasks in input order.
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }

    pub fn toggle_status(&mut self, status: Status) {
        toggle(&mut self.statuses, status);
    }

    pub fn toggle_priority(&mut self, priority: Priority) {
        toggle(&mut self.priorities, priority);
    }

    pub fn clear(&mut self) {
        *self = TaskFilter::default();
    }
}

fn toggle<T: PartialEq>(set: &mut Vec<T>, value: T) {
    if let Some(pos) = set.iter().position(|v| *v == value) {
        set.remove(pos);
    } else {
        set.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::tests::task;

    #[test]
    fn test_filter_combines_search_and_sets() {
        let mut a = task(1, Status::Todo);
        a.title = "Order solar panels".into();
        a.priority = Priority::High;
        let mut b = task(2, Status::Doing);
        b.title = "Panel inspection".into();
        let c = task(3, Status::Done);
        let tasks = vec![a, b, c];

        let mut filter = TaskFilter {
            search: " PANEL".into(),
            ..Default::default()
        };
        assert_eq!(filter.apply(&tasks).len(), 2);

        filter.toggle_priority(Priority::High);
        let ids: Vec<u64> = filter.apply(&tasks).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1]);

        filter.toggle_priority(Priority::High);
        filter.toggle_status(Status::Doing);
        let ids: Vec<u64> = filter.apply(&tasks).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2]);

        filter.clear();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&tasks).len(), 3);
    }
}
