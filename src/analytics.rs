//! Project overview analytics.
//!
//! [`compute_overview`] is a pure function from the task list, the project's
//! date window and "today" to an [`OverviewStats`] snapshot. Nothing is cached:
//! callers recompute whenever any input changes. Missing or unparsable dates
//! only remove a task from the metrics that need them.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::dates::days_between;
use crate::fields::Status;
use crate::task::Task;

/// Length of the daily activity series.
pub const ACTIVITY_WINDOW_DAYS: usize = 14;
/// Number of most recently created tasks kept for the activity feed.
pub const RECENT_TASKS: usize = 4;
const MOMENTUM_THRESHOLD: f64 = 0.1;

/// The owning project's declared date range. Either bound may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ProjectWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        ProjectWindow { start, end }
    }

    fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Tasks starting and falling due on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub started: usize,
    pub due: usize,
}

impl DailyActivity {
    /// Short `dd.mm` axis label.
    pub fn label(&self) -> String {
        self.date.format("%d.%m").to_string()
    }
}

/// Week-over-week trend in tasks started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Up,
    Down,
    Stable,
    /// Not enough activity to call a trend.
    #[serde(rename = "none")]
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Healthy,
    Warning,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        if score < 35 {
            RiskLevel::Healthy
        } else if score < 70 {
            RiskLevel::Warning
        } else {
            RiskLevel::Critical
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            RiskLevel::Healthy => "Mostly under control: keep an eye on overdue tasks and missing dates.",
            RiskLevel::Warning => "Noticeable problems: focus on overdue and high-priority tasks.",
            RiskLevel::Critical => "High risk: many overdue or poorly defined tasks, the project needs attention.",
        }
    }
}

/// Which status column dominates the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadHint {
    Empty,
    WipHeavy,
    BacklogHeavy,
    NearlyDone,
    Balanced,
}

impl WorkloadHint {
    pub fn message(self) -> &'static str {
        match self {
            WorkloadHint::Empty => "No tasks yet: add the first one to see the workflow.",
            WorkloadHint::WipHeavy => "A lot in progress: watch for blockers and flow.",
            WorkloadHint::BacklogHeavy => "Backlog dominates: review priorities and start key tasks.",
            WorkloadHint::NearlyDone => "Most work is done: you are close to the finish.",
            WorkloadHint::Balanced => "Work is spread fairly evenly.",
        }
    }
}

/// Elapsed share of the project window against completed share of tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleProgress {
    pub time_progress_pct: i64,
    pub schedule_delta_pct: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Forecast {
    pub days_remaining: i64,
    pub completion_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleBucket {
    pub label: &'static str,
    pub count: usize,
}

/// Start-to-due durations of tasks that define both dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStats {
    pub mean: f64,
    pub median: f64,
    pub max: i64,
    pub buckets: [CycleBucket; 4],
}

/// Derived metrics snapshot for the project overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewStats {
    pub total: usize,
    pub todo_count: usize,
    pub doing_count: usize,
    pub done_count: usize,
    pub high_priority_count: usize,
    pub overdue_count: usize,
    pub high_priority_overdue_count: usize,
    pub no_start_date_count: usize,
    pub no_due_date_count: usize,
    pub missing_dates_count: usize,
    pub completion_rate: f64,
    pub daily_activity: Vec<DailyActivity>,
    pub momentum: Momentum,
    /// Counts per weekday, Sunday first.
    pub weekday_counts: [usize; 7],
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub task_progress_pct: i64,
    pub schedule: Option<ScheduleProgress>,
    pub forecast: Option<Forecast>,
    pub cycle: Option<CycleStats>,
    pub recent_tasks: Vec<Task>,
}

/// A task is overdue when it is not done and either started before today or
/// spans outside the project window.
pub fn is_overdue(task: &Task, today: NaiveDate, window: ProjectWindow) -> bool {
    if task.is_done() {
        return false;
    }
    let started_before_today = task.start_date.is_some_and(|start| start < today);
    started_before_today || is_outside_window(task, window)
}

fn is_outside_window(task: &Task, window: ProjectWindow) -> bool {
    if window.is_unbounded() {
        return false;
    }
    let (Some(start), Some(end)) = (
        task.start_date.or(task.due_date),
        task.due_date.or(task.start_date),
    ) else {
        return false;
    };
    window.start.is_some_and(|ps| start < ps) || window.end.is_some_and(|pe| end > pe)
}

/// Classify two weekly sums of started tasks.
///
/// The change is measured against the larger of the two weeks, so the
/// classification is symmetric for growth and decline.
pub fn momentum_from_sums(last: usize, prior: usize) -> Momentum {
    if last == 0 && prior == 0 {
        return Momentum::NoData;
    }
    let diff = last as f64 - prior as f64;
    let ratio = diff / last.max(prior) as f64;
    if ratio > MOMENTUM_THRESHOLD {
        Momentum::Up
    } else if ratio < -MOMENTUM_THRESHOLD {
        Momentum::Down
    } else {
        Momentum::Stable
    }
}

/// Compare the last 7 days of the series against the 7 before them.
pub fn momentum(series: &[DailyActivity]) -> Momentum {
    if series.len() < ACTIVITY_WINDOW_DAYS {
        return Momentum::NoData;
    }
    let n = series.len();
    let sum = |days: &[DailyActivity]| days.iter().map(|p| p.started).sum::<usize>();
    momentum_from_sums(sum(&series[n - 7..]), sum(&series[n - 14..n - 7]))
}

fn daily_activity(tasks: &[Task], today: NaiveDate) -> Vec<DailyActivity> {
    (0..ACTIVITY_WINDOW_DAYS as i64)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            DailyActivity {
                date,
                started: tasks.iter().filter(|t| t.start_date == Some(date)).count(),
                due: tasks.iter().filter(|t| t.due_date == Some(date)).count(),
            }
        })
        .collect()
}

/// Start date, falling back to the calendar day the task was created.
fn reference_date(task: &Task) -> Option<NaiveDate> {
    task.start_date
        .or_else(|| task.created_at.map(|ts| ts.date_naive()))
}

fn weekday_counts(tasks: &[Task]) -> [usize; 7] {
    let mut counts = [0; 7];
    for date in tasks.iter().filter_map(reference_date) {
        counts[date.weekday().num_days_from_sunday() as usize] += 1;
    }
    counts
}

fn schedule_progress(window: ProjectWindow, today: NaiveDate, task_progress_pct: i64) -> Option<ScheduleProgress> {
    let (start, end) = (window.start?, window.end?);
    if end <= start {
        return None;
    }
    let total_days = days_between(start, end).max(1);
    let elapsed = days_between(start, today.clamp(start, end)).clamp(0, total_days);
    let time_progress_pct = (elapsed as f64 / total_days as f64 * 100.0).round() as i64;
    Some(ScheduleProgress {
        time_progress_pct,
        schedule_delta_pct: task_progress_pct - time_progress_pct,
    })
}

fn forecast(tasks: &[Task], done: usize, today: NaiveDate) -> Option<Forecast> {
    if done == 0 {
        return None;
    }
    let first = tasks
        .iter()
        .filter(|t| t.is_done())
        .filter_map(reference_date)
        .min()?;
    let span = days_between(first, today).max(1);
    let velocity = done as f64 / span as f64;
    let remaining = tasks.len() - done;
    if velocity <= 0.0 || remaining == 0 {
        return None;
    }
    let days_remaining = (remaining as f64 / velocity).round() as i64;
    Some(Forecast {
        days_remaining,
        completion_date: today + Duration::days(days_remaining),
    })
}

/// Mean, median, max and histogram of the given durations (in days).
pub fn cycle_stats(durations: &[i64]) -> Option<CycleStats> {
    if durations.is_empty() {
        return None;
    }
    let mut sorted = durations.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let mean = sorted.iter().sum::<i64>() as f64 / n as f64;
    let mid = n / 2;
    let median = if n % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    };

    let mut buckets = [
        CycleBucket { label: "0-1d", count: 0 },
        CycleBucket { label: "2-3d", count: 0 },
        CycleBucket { label: "4-7d", count: 0 },
        CycleBucket { label: "8+d", count: 0 },
    ];
    for &d in &sorted {
        let slot = match d {
            d if d <= 1 => 0,
            2..=3 => 1,
            4..=7 => 2,
            _ => 3,
        };
        buckets[slot].count += 1;
    }

    Some(CycleStats {
        mean,
        median,
        max: sorted[n - 1],
        buckets,
    })
}

fn cycle_durations(tasks: &[Task]) -> Vec<i64> {
    tasks
        .iter()
        .filter_map(|t| Some(days_between(t.start_date?, t.due_date?)))
        .filter(|d| *d >= 0)
        .collect()
}

fn recent_tasks(tasks: &[Task]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(RECENT_TASKS);
    sorted
}

/// Compute the overview snapshot.
pub fn compute_overview(tasks: &[Task], window: ProjectWindow, today: NaiveDate) -> OverviewStats {
    let total = tasks.len();
    let count = |status: Status| tasks.iter().filter(|t| t.status == status).count();
    let (todo_count, doing_count, done_count) = (count(Status::Todo), count(Status::Doing), count(Status::Done));

    let high_priority_count = tasks.iter().filter(|t| t.is_high_priority()).count();
    let overdue: Vec<&Task> = tasks.iter().filter(|t| is_overdue(t, today, window)).collect();
    let overdue_count = overdue.len();
    let high_priority_overdue_count = overdue.iter().filter(|t| t.is_high_priority()).count();

    let no_start_date_count = tasks.iter().filter(|t| t.start_date.is_none()).count();
    let no_due_date_count = tasks.iter().filter(|t| t.due_date.is_none()).count();
    let missing_dates_count = tasks
        .iter()
        .filter(|t| t.start_date.is_none() || t.due_date.is_none())
        .count();

    let completion_rate = if total == 0 { 0.0 } else { done_count as f64 / total as f64 };

    let daily_activity = daily_activity(tasks, today);
    let momentum = momentum(&daily_activity);

    let risk_score = if total == 0 {
        0
    } else {
        let t = total as f64;
        let raw = 0.5 * (overdue_count as f64 / t)
            + 0.3 * (high_priority_overdue_count as f64 / t)
            + 0.2 * ((no_start_date_count + no_due_date_count) as f64 / (2.0 * t));
        (raw * 100.0).round().clamp(0.0, 100.0) as u8
    };

    let task_progress_pct = (completion_rate * 100.0).round() as i64;

    OverviewStats {
        total,
        todo_count,
        doing_count,
        done_count,
        high_priority_count,
        overdue_count,
        high_priority_overdue_count,
        no_start_date_count,
        no_due_date_count,
        missing_dates_count,
        completion_rate,
        daily_activity,
        momentum,
        weekday_counts: weekday_counts(tasks),
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
        task_progress_pct,
        schedule: schedule_progress(window, today, task_progress_pct),
        forecast: forecast(tasks, done_count, today),
        cycle: cycle_stats(&cycle_durations(tasks)),
        recent_tasks: recent_tasks(tasks),
    }
}

fn pct(part: usize, total: usize) -> u8 {
    if total == 0 {
        0
    } else {
        (part as f64 / total as f64 * 100.0).round() as u8
    }
}

impl OverviewStats {
    /// Todo, doing and done shares in percent; done absorbs the rounding so the
    /// three always add up to 100 (or are all zero).
    pub fn status_split(&self) -> (u8, u8, u8) {
        let status_total = self.todo_count + self.doing_count + self.done_count;
        if status_total == 0 {
            return (0, 0, 0);
        }
        let todo = pct(self.todo_count, status_total);
        let doing = pct(self.doing_count, status_total);
        let done = 100u8.saturating_sub(todo).saturating_sub(doing);
        (todo, doing, done)
    }

    /// Share of tasks missing a start or due date.
    pub fn planning_risk_pct(&self) -> u8 {
        pct(self.missing_dates_count, self.total)
    }

    pub fn wip_load_pct(&self) -> u8 {
        pct(self.doing_count, self.total)
    }

    pub fn high_priority_share_pct(&self) -> u8 {
        pct(self.high_priority_count, self.total)
    }

    pub fn workload_hint(&self) -> WorkloadHint {
        let (todo, doing, done) = (self.todo_count, self.doing_count, self.done_count);
        if todo + doing + done == 0 {
            WorkloadHint::Empty
        } else if doing > todo && doing > done {
            WorkloadHint::WipHeavy
        } else if todo > doing && todo > done {
            WorkloadHint::BacklogHeavy
        } else if done > todo && done > doing {
            WorkloadHint::NearlyDone
        } else {
            WorkloadHint::Balanced
        }
    }

    /// Days of the activity series with anything started or due.
    pub fn active_days(&self) -> usize {
        self.daily_activity
            .iter()
            .filter(|p| p.started > 0 || p.due > 0)
            .count()
    }
}
