//! Command implementations for the CLI interface.
//!
//! Each subcommand talks to the tracker through [`HttpApi`]. Board and
//! timeline commands go through the same optimistic updaters the interactive
//! board uses, so a rejected change is reported exactly as it would be there.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::analytics::{compute_overview, OverviewStats, ProjectWindow};
use crate::api::{fetch_all_tasks, HttpApi, TaskApi, TaskListParams};
use crate::board::{KanbanBoard, Move};
use crate::dates::{format_date, format_due_relative, parse_date_input, truncate};
use crate::fields::*;
use crate::filter::TaskFilter;
use crate::project::Project;
use crate::task::{Task, TaskDraft, TaskPatch, TaskScope};
use crate::timeline::{Reschedule, TimelineBoard};
use crate::tui::board::BoardApp;
use crate::tui::board_run::run_board_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// List tasks with optional filters.
    List {
        /// Only tasks of this project.
        #[arg(long)]
        project: Option<u64>,
        /// Only tasks of this funding.
        #[arg(long)]
        funding: Option<u64>,
        /// Only tasks without a project or funding.
        #[arg(long, conflicts_with_all = ["project", "funding"])]
        unassigned: bool,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Search in titles and descriptions (server side).
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = TaskOrdering::Newest)]
        ordering: TaskOrdering,
        /// Fetch a single page instead of following every page.
        #[arg(long)]
        page: Option<u32>,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
        /// Print raw JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Create a task.
    Add {
        /// Short title for the task (at least 3 characters).
        title: String,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum, default_value_t = Status::Todo)]
        status: Status,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Start date: YYYY-MM-DD, "today", "tomorrow", "in Nd", weekday names...
        #[arg(long)]
        start: Option<String>,
        /// Due date, same formats as --start.
        #[arg(long)]
        due: Option<String>,
        /// Attach to a project.
        #[arg(long, conflicts_with = "funding")]
        project: Option<u64>,
        /// Attach to a funding.
        #[arg(long)]
        funding: Option<u64>,
        /// Estimated hours.
        #[arg(long)]
        est_hours: Option<String>,
        #[arg(long)]
        cost: Option<String>,
        #[arg(long)]
        currency: Option<String>,
    },

    /// Update fields on a task. Only the given fields are sent.
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long, conflicts_with = "clear_start")]
        start: Option<String>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_start: bool,
        #[arg(long)]
        clear_due: bool,
        #[arg(long, conflicts_with_all = ["funding", "unassign"])]
        project: Option<u64>,
        #[arg(long, conflicts_with = "unassign")]
        funding: Option<u64>,
        /// Detach from project and funding.
        #[arg(long)]
        unassign: bool,
    },

    /// Delete a task.
    Delete { id: u64 },

    /// List projects.
    Projects {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = ProjectOrdering::Name)]
        ordering: ProjectOrdering,
        #[arg(long)]
        page: Option<u32>,
    },

    /// Project dashboard: progress, risk, momentum, forecast and cycle time.
    Overview {
        project: u64,
        /// Evaluate as of this date instead of today.
        #[arg(long)]
        today: Option<String>,
        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a project's kanban board.
    Board {
        project: u64,
        #[arg(long)]
        search: Option<String>,
        /// Only these priorities. May be repeated.
        #[arg(long = "priority", value_enum)]
        priorities: Vec<Priority>,
    },

    /// Move a task to another board column.
    Move {
        id: u64,
        #[arg(value_enum)]
        to: Status,
        /// Position in the destination column (0 = top).
        #[arg(long, default_value_t = 0)]
        position: usize,
    },

    /// Print a project's timeline.
    Timeline {
        project: u64,
        #[arg(long)]
        search: Option<String>,
        /// Only these statuses. May be repeated.
        #[arg(long = "status", value_enum)]
        statuses: Vec<Status>,
        /// Only these priorities. May be repeated.
        #[arg(long = "priority", value_enum)]
        priorities: Vec<Priority>,
    },

    /// Change a task's start and due dates.
    Reschedule {
        id: u64,
        #[arg(long, conflicts_with = "clear_start")]
        start: Option<String>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_start: bool,
        #[arg(long)]
        clear_due: bool,
    },

    /// Launch the interactive kanban board for a project.
    Ui { project: u64 },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_date_arg(value: Option<&str>, today: NaiveDate) -> Result<Option<NaiveDate>> {
    value
        .map(|s| parse_date_input(s, today).ok_or_else(|| anyhow!("invalid date: {s}")))
        .transpose()
}

/// Listing that contains `task`, used to place it on a board.
fn scope_params(task: &Task) -> Option<TaskListParams> {
    match task.scope() {
        TaskScope::Project(id) => Some(TaskListParams::for_project(id)),
        TaskScope::Funding(id) => Some(TaskListParams {
            funding: Some(id),
            ..Default::default()
        }),
        TaskScope::Unassigned => Some(TaskListParams {
            unassigned: true,
            ..Default::default()
        }),
        TaskScope::ProjectFunding(_) => None,
    }
}

async fn load_scope(api: &HttpApi, task: Task) -> Result<Vec<Task>> {
    match scope_params(&task) {
        Some(params) => Ok(fetch_all_tasks(api, &params).await?),
        None => Ok(vec![task]),
    }
}

/// Print tasks as a fixed-width table.
pub fn print_table(tasks: &[&Task]) {
    println!(
        "{:<6} {:<6} {:<7} {:<11} {:<12} {:<16} {}",
        "ID", "Status", "Pri", "Start", "Due", "Scope", "Title"
    );
    let today = today();
    for t in tasks {
        let scope = match t.scope() {
            TaskScope::Project(id) => t.project_name.clone().unwrap_or_else(|| format!("P{id}")),
            TaskScope::Funding(id) => t.funding_name.clone().unwrap_or_else(|| format!("F{id}")),
            TaskScope::ProjectFunding(id) => format!("PF{id}"),
            TaskScope::Unassigned => "-".into(),
        };
        println!(
            "{:<6} {:<6} {:<7} {:<11} {:<12} {:<16} {}",
            t.id,
            t.status.as_str(),
            t.priority.label(),
            format_date(t.start_date),
            format_due_relative(t.due_date, today),
            truncate(&scope, 16),
            t.title
        );
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_list(
    api: &HttpApi,
    project: Option<u64>,
    funding: Option<u64>,
    unassigned: bool,
    status: Option<Status>,
    priority: Option<Priority>,
    search: Option<String>,
    ordering: TaskOrdering,
    page: Option<u32>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let params = TaskListParams {
        project,
        funding,
        unassigned,
        status,
        ordering: Some(ordering),
        page,
        search,
        priority,
    };
    let mut tasks = match page {
        Some(_) => api.list_tasks(&params).await?.results,
        None => fetch_all_tasks(api, &params).await?,
    };
    if let Some(n) = limit {
        tasks.truncate(n);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    let rows: Vec<&Task> = tasks.iter().collect();
    print_table(&rows);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_add(
    api: &HttpApi,
    title: String,
    desc: Option<String>,
    status: Status,
    priority: Priority,
    start: Option<String>,
    due: Option<String>,
    project: Option<u64>,
    funding: Option<u64>,
    est_hours: Option<String>,
    cost: Option<String>,
    currency: Option<String>,
) -> Result<()> {
    let today = today();
    let mut draft = TaskDraft::new(title);
    draft.description = desc;
    draft.status = status;
    draft.priority = priority;
    draft.start_date = parse_date_arg(start.as_deref(), today)?;
    draft.due_date = parse_date_arg(due.as_deref(), today)?;
    draft.est_hours = est_hours;
    draft.cost_amount = cost;
    draft.cost_currency = currency;
    draft.scope = match (project, funding) {
        (Some(_), _) => ScopeKind::Project,
        (None, Some(_)) => ScopeKind::Funding,
        (None, None) => ScopeKind::Unassigned,
    };
    draft.project_id = project;
    draft.funding_id = funding;

    let payload = draft.validate()?;
    let created = api.create_task(&payload).await?;
    tracing::info!(task_id = created.id, "task created");
    println!("Added task {}: {}", created.id, created.title);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_update(
    api: &HttpApi,
    id: u64,
    title: Option<String>,
    desc: Option<String>,
    status: Option<Status>,
    priority: Option<Priority>,
    start: Option<String>,
    due: Option<String>,
    clear_start: bool,
    clear_due: bool,
    project: Option<u64>,
    funding: Option<u64>,
    unassign: bool,
) -> Result<()> {
    let today = today();
    let mut patch = TaskPatch {
        title,
        description: desc.map(|d| Some(d).filter(|d| !d.trim().is_empty())),
        status,
        priority,
        ..Default::default()
    };
    if clear_start {
        patch.start_date = Some(None);
    } else if let Some(d) = parse_date_arg(start.as_deref(), today)? {
        patch.start_date = Some(Some(d));
    }
    if clear_due {
        patch.due_date = Some(None);
    } else if let Some(d) = parse_date_arg(due.as_deref(), today)? {
        patch.due_date = Some(Some(d));
    }
    if unassign {
        patch.project = Some(None);
        patch.funding = Some(None);
    } else if let Some(p) = project {
        patch.project = Some(Some(p));
        patch.funding = Some(None);
    } else if let Some(f) = funding {
        patch.funding = Some(Some(f));
        patch.project = Some(None);
    }

    if patch.is_empty() {
        println!("Nothing to update.");
        return Ok(());
    }
    let current = api.get_task(id).await?;
    patch.validate_against(&current)?;
    let updated = api.update_task(id, &patch).await?;
    println!("Updated task {}: {}", updated.id, updated.title);
    Ok(())
}

pub async fn cmd_delete(api: &HttpApi, id: u64) -> Result<()> {
    api.delete_task(id).await?;
    println!("Deleted task {id}.");
    Ok(())
}

pub async fn cmd_projects(
    api: &HttpApi,
    search: Option<String>,
    ordering: ProjectOrdering,
    page: Option<u32>,
) -> Result<()> {
    let listing = api.list_projects(Some(ordering), search.as_deref(), page).await?;
    println!(
        "{:<6} {:<24} {:<7} {:<11} {:<11} {}",
        "ID", "Name", "Status", "Start", "End", "Description"
    );
    for p in &listing.results {
        println!(
            "{:<6} {:<24} {:<7} {:<11} {:<11} {}",
            p.id,
            truncate(&p.name, 24),
            format!("{:?}", p.status).to_lowercase(),
            format_date(p.start_date),
            format_date(p.end_date),
            p.tagline()
        );
    }
    if listing.next.is_some() {
        println!("({} projects in total, use --page for more)", listing.count);
    }
    Ok(())
}

pub async fn cmd_overview(api: &HttpApi, project_id: u64, as_of: Option<String>, json: bool) -> Result<()> {
    let today = match parse_date_arg(as_of.as_deref(), today())? {
        Some(d) => d,
        None => today(),
    };
    let project = api
        .get_project(project_id)
        .await
        .with_context(|| format!("loading project {project_id}"))?;
    let tasks = fetch_all_tasks(api, &TaskListParams::for_project(project_id)).await?;
    let window = ProjectWindow::new(project.start_date, project.end_date);
    let stats = compute_overview(&tasks, window, today);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_overview(&project, &stats);
    }
    Ok(())
}

fn print_overview(project: &Project, stats: &OverviewStats) {
    println!("{} ({} → {})", project.name, format_date(project.start_date), format_date(project.end_date));
    if stats.total == 0 {
        println!("No tasks yet.");
        return;
    }

    let (todo_pct, doing_pct, done_pct) = stats.status_split();
    println!();
    println!(
        "Tasks:          {} ({} todo {}%, {} doing {}%, {} done {}%)",
        stats.total, stats.todo_count, todo_pct, stats.doing_count, doing_pct, stats.done_count, done_pct
    );
    println!("Completion:     {}%", stats.task_progress_pct);
    if let Some(schedule) = &stats.schedule {
        println!(
            "Time elapsed:   {}% (work {:+} pts vs time)",
            schedule.time_progress_pct, schedule.schedule_delta_pct
        );
    }
    println!(
        "Overdue:        {} ({} high priority)",
        stats.overdue_count, stats.high_priority_overdue_count
    );
    println!(
        "Missing dates:  {} (no start {}, no due {}; planning risk {}%)",
        stats.missing_dates_count,
        stats.no_start_date_count,
        stats.no_due_date_count,
        stats.planning_risk_pct()
    );
    println!(
        "High priority:  {} ({}%), WIP load {}%",
        stats.high_priority_count,
        stats.high_priority_share_pct(),
        stats.wip_load_pct()
    );
    println!(
        "Risk:           {}/100 {:?}: {}",
        stats.risk_score,
        stats.risk_level,
        stats.risk_level.message()
    );
    println!("Momentum:       {:?}", stats.momentum);
    match &stats.forecast {
        Some(f) => println!("Forecast:       ~{} days ({})", f.days_remaining, f.completion_date),
        None => println!("Forecast:       -"),
    }
    if let Some(cycle) = &stats.cycle {
        let buckets: Vec<String> = cycle.buckets.iter().map(|b| format!("{} {}", b.label, b.count)).collect();
        println!(
            "Cycle time:     mean {:.1}d, median {:.1}d, max {}d [{}]",
            cycle.mean,
            cycle.median,
            cycle.max,
            buckets.join(", ")
        );
    }
    println!("Workload:       {}", stats.workload_hint().message());

    println!();
    println!("Last {} days (started/due):", stats.daily_activity.len());
    let line: Vec<String> = stats
        .daily_activity
        .iter()
        .map(|p| format!("{} {}/{}", p.label(), p.started, p.due))
        .collect();
    println!("  {}", line.join("  "));

    const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    let rhythm: Vec<String> = WEEKDAYS
        .iter()
        .zip(stats.weekday_counts)
        .map(|(d, c)| format!("{d} {c}"))
        .collect();
    println!("Weekday rhythm: {}", rhythm.join("  "));

    if !stats.recent_tasks.is_empty() {
        println!();
        println!("Recently added:");
        for t in &stats.recent_tasks {
            println!("  #{:<5} {:<6} {}", t.id, t.status.as_str(), t.title);
        }
    }
}

pub async fn cmd_board(
    api: &HttpApi,
    project: u64,
    search: Option<String>,
    priorities: Vec<Priority>,
) -> Result<()> {
    let mut board = KanbanBoard::load(api, &TaskListParams::for_project(project).ordered(TaskOrdering::PriorityDesc)).await?;
    board.set_filter(TaskFilter {
        search: search.unwrap_or_default(),
        statuses: Vec::new(),
        priorities,
    });

    for status in Status::ALL {
        let tasks = board.column_tasks(status);
        println!("== {} ({})", status.title(), tasks.len());
        for t in tasks {
            println!(
                "  #{:<5} {:<6} {:<12} {}",
                t.id,
                t.priority.label(),
                format_due_relative(t.due_date, today()),
                t.title
            );
        }
    }
    Ok(())
}

pub async fn cmd_move(api: &HttpApi, id: u64, to: Status, position: usize) -> Result<()> {
    let task = api.get_task(id).await?;
    let from = task.status;
    let mut board = KanbanBoard::new(load_scope(api, task).await?);
    board.move_task(api, Move { task_id: id, from, to, index: position }).await?;

    if from == to {
        println!("Task {id} stays in {}.", to.title());
    } else {
        println!("Moved task {id}: {} → {}.", from.title(), to.title());
    }
    Ok(())
}

pub async fn cmd_timeline(
    api: &HttpApi,
    project: u64,
    search: Option<String>,
    statuses: Vec<Status>,
    priorities: Vec<Priority>,
) -> Result<()> {
    let mut board = TimelineBoard::load(api, &TaskListParams::for_project(project).ordered(TaskOrdering::PriorityDesc)).await?;
    board.set_filter(TaskFilter {
        search: search.unwrap_or_default(),
        statuses,
        priorities,
    });

    let (min, max) = board.bounds(today());
    let metrics = board.metrics();
    println!("{} → {}", min, max);
    println!(
        "{} tasks: {} todo, {} doing, {} done; average span {} days",
        metrics.total, metrics.todo, metrics.doing, metrics.done, metrics.avg_days
    );
    if board.spans().is_empty() {
        println!("No scheduled tasks.");
        return Ok(());
    }

    const WIDTH: i64 = 48;
    let total_days = (max - min).num_days().max(1);
    let column = |d: NaiveDate| ((d - min).num_days() * WIDTH / total_days).clamp(0, WIDTH - 1) as usize;
    for span in board.spans() {
        let (a, b) = (column(span.start), column(span.end));
        let mut bar = vec![' '; WIDTH as usize];
        if span.has_range {
            for cell in &mut bar[a..=b.max(a)] {
                *cell = '█';
            }
        } else {
            bar[a] = '◆';
        }
        println!(
            "#{:<5} {:<6} {} → {} |{}| {}",
            span.task_id,
            span.status.as_str(),
            span.start,
            span.end,
            bar.into_iter().collect::<String>(),
            truncate(&span.title, 40)
        );
    }
    Ok(())
}

pub async fn cmd_reschedule(
    api: &HttpApi,
    id: u64,
    start: Option<String>,
    due: Option<String>,
    clear_start: bool,
    clear_due: bool,
) -> Result<()> {
    let today = today();
    let task = api.get_task(id).await?;
    let start = if clear_start {
        None
    } else {
        parse_date_arg(start.as_deref(), today)?.or(task.start_date)
    };
    let due = if clear_due {
        None
    } else {
        parse_date_arg(due.as_deref(), today)?.or(task.due_date)
    };

    let mut board = TimelineBoard::new(load_scope(api, task).await?);
    board.reschedule(api, Reschedule { task_id: id, start, due }).await?;
    println!("Task {id}: {} → {}", format_date(start), format_date(due));
    Ok(())
}

/// Launch the interactive board. Blocks the current worker until the user quits.
pub async fn cmd_ui(api: HttpApi, project_id: u64) -> Result<()> {
    let project = api.get_project(project_id).await?;
    let params = TaskListParams::for_project(project_id).ordered(TaskOrdering::PriorityDesc);
    let board = KanbanBoard::load(&api, &params).await?;

    let api: Arc<dyn TaskApi> = Arc::new(api);
    let runtime = tokio::runtime::Handle::current();
    let mut app = BoardApp::new(board, api, params, runtime, project.name);
    tokio::task::block_in_place(|| run_board_tui(&mut app)).context("board UI failed")?;
    Ok(())
}

pub fn cmd_completions(shell: Shell) -> Result<()> {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
    Ok(())
}

/// Run a parsed subcommand against `api`.
pub async fn dispatch(api: HttpApi, command: Commands) -> Result<()> {
    match command {
        Commands::List { project, funding, unassigned, status, priority, search, ordering, page, limit, json } => {
            cmd_list(&api, project, funding, unassigned, status, priority, search, ordering, page, limit, json).await
        }
        Commands::Add { title, desc, status, priority, start, due, project, funding, est_hours, cost, currency } => {
            cmd_add(&api, title, desc, status, priority, start, due, project, funding, est_hours, cost, currency).await
        }
        Commands::Update {
            id, title, desc, status, priority, start, due, clear_start, clear_due, project, funding, unassign,
        } => {
            cmd_update(
                &api, id, title, desc, status, priority, start, due, clear_start, clear_due, project, funding,
                unassign,
            )
            .await
        }
        Commands::Delete { id } => cmd_delete(&api, id).await,
        Commands::Projects { search, ordering, page } => cmd_projects(&api, search, ordering, page).await,
        Commands::Overview { project, today, json } => cmd_overview(&api, project, today, json).await,
        Commands::Board { project, search, priorities } => cmd_board(&api, project, search, priorities).await,
        Commands::Move { id, to, position } => cmd_move(&api, id, to, position).await,
        Commands::Timeline { project, search, statuses, priorities } => {
            cmd_timeline(&api, project, search, statuses, priorities).await
        }
        Commands::Reschedule { id, start, due, clear_start, clear_due } => {
            cmd_reschedule(&api, id, start, due, clear_start, clear_due).await
        }
        Commands::Ui { project } => cmd_ui(api, project).await,
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::tests::task;

    #[test]
    fn test_scope_params_follow_task_scope() {
        let t = task(1, Status::Todo);
        assert_eq!(scope_params(&t), Some(TaskListParams::for_project(1)));

        let mut t = task(2, Status::Todo);
        t.scope_project = None;
        assert!(scope_params(&t).unwrap().unassigned);

        t.scope_project_funding = Some(4);
        assert_eq!(scope_params(&t), None);
    }

    #[test]
    fn test_parse_date_arg() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert_eq!(parse_date_arg(None, today).unwrap(), None);
        assert_eq!(parse_date_arg(Some("tomorrow"), today).unwrap(), NaiveDate::from_ymd_opt(2025, 4, 2));
        assert!(parse_date_arg(Some("someday"), today).is_err());
    }
}
