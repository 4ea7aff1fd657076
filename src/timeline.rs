//! Timeline (Gantt) view of a task listing with optimistic rescheduling.

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::{fetch_all_tasks, TaskApi, TaskListParams};
use crate::board::{reapply_pending, MoveState, Notice, NoticeLevel};
use crate::cache::TaskCache;
use crate::dates::{add_months_to_first, days_between, first_of_month, last_of_month};
use crate::error::{ApiError, BoardError};
use crate::fields::*;
use crate::filter::TaskFilter;
use crate::task::{Task, TaskPatch};

/// A task placed on the time axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineSpan {
    pub task_id: u64,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// False for one-day milestones built from a single date.
    pub has_range: bool,
}

impl TimelineSpan {
    /// `None` when the task has no dates at all.
    pub fn from_task(task: &Task) -> Option<Self> {
        let start = task.start_date.or(task.due_date)?;
        let end = task.due_date.or(task.start_date)?;
        Some(TimelineSpan {
            task_id: task.id,
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            start,
            end,
            has_range: task.start_date.is_some() && task.due_date.is_some(),
        })
    }

    pub fn length_days(&self) -> i64 {
        days_between(self.start, self.end)
    }
}

/// Spans of the tasks matching `filter`, ordered by start then id.
pub fn normalize(tasks: &[Task], filter: &TaskFilter) -> Vec<TimelineSpan> {
    let mut spans: Vec<TimelineSpan> = tasks
        .iter()
        .filter(|t| filter.matches(t))
        .filter_map(TimelineSpan::from_task)
        .collect();
    spans.sort_by_key(|s| (s.start, s.task_id));
    spans
}

/// Visible date range: whole months around the spans, or the months around
/// `today` when there is nothing to show.
pub fn bounds(spans: &[TimelineSpan], today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let min = spans.iter().map(|s| s.start).min();
    let max = spans.iter().map(|s| s.end).max();
    match (min, max) {
        (Some(min), Some(max)) => (first_of_month(min), last_of_month(max)),
        _ => (
            add_months_to_first(today, -1),
            last_of_month(add_months_to_first(today, 1)),
        ),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimelineMetrics {
    pub total: usize,
    pub todo: usize,
    pub doing: usize,
    pub done: usize,
    pub avg_days: i64,
}

pub fn metrics(spans: &[TimelineSpan]) -> TimelineMetrics {
    let count = |status: Status| spans.iter().filter(|s| s.status == status).count();
    let total = spans.len();
    let avg_days = if total == 0 {
        0
    } else {
        let sum: i64 = spans.iter().map(TimelineSpan::length_days).sum();
        (sum as f64 / total as f64).round() as i64
    };
    TimelineMetrics {
        total,
        todo: count(Status::Todo),
        doing: count(Status::Doing),
        done: count(Status::Done),
        avg_days,
    }
}

/// A reschedule gesture: move or resize the span of `task_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reschedule {
    pub task_id: u64,
    pub start: Option<NaiveDate>,
    pub due: Option<NaiveDate>,
}

/// Timeline state over a cached listing.
pub struct TimelineBoard {
    cache: TaskCache,
    filter: TaskFilter,
    spans: Vec<TimelineSpan>,
    states: std::collections::HashMap<u64, MoveState>,
    notices: Vec<Notice>,
}

impl TimelineBoard {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut board = TimelineBoard {
            cache: TaskCache::new(tasks),
            filter: TaskFilter::default(),
            spans: Vec::new(),
            states: Default::default(),
            notices: Vec::new(),
        };
        board.recompute();
        board
    }

    pub async fn load(api: &dyn TaskApi, params: &TaskListParams) -> Result<Self, ApiError> {
        Ok(Self::new(fetch_all_tasks(api, params).await?))
    }

    fn recompute(&mut self) {
        self.spans = normalize(self.cache.tasks(), &self.filter);
    }

    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    pub fn spans(&self) -> &[TimelineSpan] {
        &self.spans
    }

    pub fn span(&self, task_id: u64) -> Option<&TimelineSpan> {
        self.spans.iter().find(|s| s.task_id == task_id)
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
        self.recompute();
    }

    pub fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.cache.replace_all(tasks);
        reapply_pending(&mut self.cache, &mut self.states);
        self.recompute();
    }

    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        bounds(&self.spans, today)
    }

    pub fn metrics(&self) -> TimelineMetrics {
        metrics(&self.spans)
    }

    pub fn state(&self, task_id: u64) -> &MoveState {
        self.states.get(&task_id).unwrap_or(&MoveState::Idle)
    }

    /// Apply new dates locally and return the `PATCH` to send.
    ///
    /// Unlike kanban moves this always produces a request, even when the
    /// dates did not change.
    pub fn begin_reschedule(&mut self, change: Reschedule) -> Result<TaskPatch, BoardError> {
        let task = self
            .cache
            .get(change.task_id)
            .ok_or(BoardError::UnknownTask(change.task_id))?;
        if matches!(self.states.get(&change.task_id), Some(MoveState::Applied { .. })) {
            return Err(BoardError::MoveInFlight(change.task_id));
        }
        let patch = TaskPatch::schedule(change.start, change.due);
        patch.validate_against(task)?;

        let undo = self.cache.patch(change.task_id, &patch);
        self.states.insert(
            change.task_id,
            MoveState::Applied {
                patch: patch.clone(),
                undo,
            },
        );
        self.recompute();
        tracing::debug!(task_id = change.task_id, start = ?change.start, due = ?change.due, "reschedule applied locally");
        Ok(patch)
    }

    /// Settle a reschedule with the server's answer.
    pub fn finish(&mut self, task_id: u64, result: Result<Task, ApiError>) -> Result<(), BoardError> {
        let Some(MoveState::Applied { undo, .. }) = self.states.remove(&task_id) else {
            tracing::debug!(task_id, "completion without pending reschedule ignored");
            return Ok(());
        };
        let outcome = match result {
            Ok(task) => {
                tracing::info!(task_id, "reschedule committed");
                self.cache.upsert(task);
                self.states.insert(task_id, MoveState::Committed);
                Ok(())
            }
            Err(source) => {
                tracing::warn!(task_id, error = %source, "reschedule rejected, rolling back");
                self.cache.undo(undo);
                self.notices.push(Notice {
                    level: NoticeLevel::Error,
                    message: format!("Could not reschedule task {task_id}: {source}"),
                });
                self.states.insert(
                    task_id,
                    MoveState::RolledBack {
                        error: source.to_string(),
                    },
                );
                Err(BoardError::Remote { task_id, source })
            }
        };
        self.recompute();
        outcome
    }

    pub async fn reschedule(&mut self, api: &dyn TaskApi, change: Reschedule) -> Result<(), BoardError> {
        let patch = self.begin_reschedule(change)?;
        let result = api.update_task(change.task_id, &patch).await;
        self.finish(change.task_id, result)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_api::MemoryApi;
    use crate::task::tests::task;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dated(id: u64, status: Status, start: Option<NaiveDate>, due: Option<NaiveDate>) -> Task {
        let mut t = task(id, status);
        t.start_date = start;
        t.due_date = due;
        t
    }

    #[test]
    fn test_normalize_builds_ranges_and_milestones() {
        let tasks = vec![
            dated(1, Status::Todo, Some(d(2025, 3, 5)), Some(d(2025, 3, 9))),
            dated(2, Status::Doing, None, Some(d(2025, 3, 1))),
            dated(3, Status::Done, None, None),
        ];
        let spans = normalize(&tasks, &TaskFilter::default());
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].task_id, 2);
        assert!(!spans[0].has_range);
        assert_eq!(spans[0].start, spans[0].end);
        assert!(spans[1].has_range);
        assert_eq!(spans[1].length_days(), 4);
    }

    #[test]
    fn test_bounds_cover_whole_months() {
        let tasks = vec![
            dated(1, Status::Todo, Some(d(2025, 2, 14)), Some(d(2025, 3, 2))),
            dated(2, Status::Todo, Some(d(2025, 4, 20)), None),
        ];
        let spans = normalize(&tasks, &TaskFilter::default());
        assert_eq!(bounds(&spans, d(2030, 1, 1)), (d(2025, 2, 1), d(2025, 4, 30)));
        assert_eq!(bounds(&[], d(2025, 1, 15)), (d(2024, 12, 1), d(2025, 2, 28)));
    }

    #[test]
    fn test_metrics_average_span() {
        let tasks = vec![
            dated(1, Status::Todo, Some(d(2025, 3, 1)), Some(d(2025, 3, 4))),
            dated(2, Status::Done, Some(d(2025, 3, 1)), Some(d(2025, 3, 3))),
            dated(3, Status::Done, Some(d(2025, 3, 1)), None),
        ];
        let m = metrics(&normalize(&tasks, &TaskFilter::default()));
        assert_eq!(m.total, 3);
        assert_eq!(m.done, 2);
        assert_eq!(m.avg_days, 2);
        assert_eq!(metrics(&[]), TimelineMetrics::default());
    }

    #[test]
    fn test_reschedule_rejects_inverted_range() {
        let mut board = TimelineBoard::new(vec![dated(1, Status::Todo, Some(d(2025, 3, 1)), None)]);
        let err = board
            .begin_reschedule(Reschedule {
                task_id: 1,
                start: Some(d(2025, 3, 10)),
                due: Some(d(2025, 3, 2)),
            })
            .unwrap_err();
        assert!(matches!(err, BoardError::Invalid(_)));
        assert_eq!(board.span(1).unwrap().start, d(2025, 3, 1));
    }

    #[test]
    fn test_reschedule_rolls_back_dates() {
        let mut board = TimelineBoard::new(vec![
            dated(1, Status::Todo, Some(d(2025, 3, 1)), Some(d(2025, 3, 2))),
            dated(2, Status::Todo, Some(d(2025, 3, 5)), None),
        ]);
        let patch = board
            .begin_reschedule(Reschedule {
                task_id: 1,
                start: Some(d(2025, 3, 20)),
                due: Some(d(2025, 3, 25)),
            })
            .unwrap();
        assert_eq!(patch, TaskPatch::schedule(Some(d(2025, 3, 20)), Some(d(2025, 3, 25))));
        assert_eq!(board.spans()[1].task_id, 1);

        assert!(board.finish(1, Err(ApiError::NotFound(1))).is_err());
        assert_eq!(board.spans()[0].task_id, 1);
        assert_eq!(board.span(1).unwrap().end, d(2025, 3, 2));
        assert_eq!(board.take_notices().len(), 1);
    }

    #[test]
    fn test_refresh_keeps_pending_reschedule() {
        let before = dated(1, Status::Todo, Some(d(2025, 3, 1)), Some(d(2025, 3, 2)));
        let mut board = TimelineBoard::new(vec![before.clone()]);
        let change = Reschedule {
            task_id: 1,
            start: Some(d(2025, 4, 1)),
            due: Some(d(2025, 4, 3)),
        };
        board.begin_reschedule(change).unwrap();

        board.replace_tasks(vec![before]);
        assert_eq!(board.span(1).unwrap().start, d(2025, 4, 1));

        let committed = dated(1, Status::Todo, change.start, change.due);
        board.finish(1, Ok(committed)).unwrap();
        assert_eq!(board.span(1).unwrap().end, d(2025, 4, 3));
        assert_eq!(*board.state(1), MoveState::Committed);
    }

    #[tokio::test]
    async fn test_reschedule_always_patches() {
        let start = Some(d(2025, 3, 1));
        let api = MemoryApi::new(vec![dated(1, Status::Todo, start, None)]);
        let mut board = TimelineBoard::load(&api, &TaskListParams::default()).await.unwrap();
        let unchanged = Reschedule {
            task_id: 1,
            start,
            due: None,
        };
        board.reschedule(&api, unchanged).await.unwrap();
        assert_eq!(api.updates().await.len(), 1);
        assert_eq!(*board.state(1), MoveState::Committed);
    }
}
