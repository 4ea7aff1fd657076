//! Interactive kanban board.
//!
//! Tasks are shown in three columns by workflow status. Moving a card between
//! columns updates the board immediately and sends the status change in the
//! background; the answer is applied on a later tick, and a rejected change
//! puts the old status back and shows the error in the status bar.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::api::{fetch_all_tasks, TaskApi, TaskListParams};
use crate::board::{KanbanBoard, Move, NoticeLevel};
use crate::dates::{format_date, format_due_relative};
use crate::error::ApiError;
use crate::fields::*;
use crate::filter::TaskFilter;
use crate::task::{Task, TaskScope};
use crate::tui::colors::{priority_color, status_color, text_on, DARK_PURPLE, DARK_RED};

/// Results of background requests, drained once per tick.
enum Completion {
    Move {
        task_id: u64,
        result: Result<Task, ApiError>,
    },
    Refresh(Result<Vec<Task>, ApiError>),
}

/// Kanban board application state
pub struct BoardApp {
    board: KanbanBoard,
    api: Arc<dyn TaskApi>,
    params: TaskListParams,
    runtime: Handle,
    title: String,
    selected_column: usize,
    selected_card: usize,
    column_scroll_offsets: [usize; 3],
    status_message: String,
    status_is_error: bool,
    show_task_detail: bool,
    filter_active: bool,
    filter_text: String,
    refreshing: bool,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl BoardApp {
    pub fn new(
        board: KanbanBoard,
        api: Arc<dyn TaskApi>,
        params: TaskListParams,
        runtime: Handle,
        title: impl Into<String>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let filter_text = board.filter().search.clone();
        BoardApp {
            board,
            api,
            params,
            runtime,
            title: title.into(),
            selected_column: 0,
            selected_card: 0,
            column_scroll_offsets: [0; 3],
            status_message: String::new(),
            status_is_error: false,
            show_task_detail: false,
            filter_active: false,
            filter_text,
            refreshing: false,
            tx,
            rx,
        }
    }

    fn selected_status(&self) -> Status {
        Status::ALL[self.selected_column]
    }

    fn selected_task_id(&self) -> Option<u64> {
        self.board
            .order()
            .column(self.selected_status())
            .get(self.selected_card)
            .copied()
    }

    /// Keep the selection inside the current column.
    fn clamp_selection(&mut self) {
        let column_len = self.board.order().column(self.selected_status()).len();
        if column_len == 0 {
            self.selected_card = 0;
            self.column_scroll_offsets[self.selected_column] = 0;
        } else if self.selected_card >= column_len {
            self.selected_card = column_len - 1;
        }
    }

    /// Put the selection back on `task_id` wherever it now lives.
    fn follow_task(&mut self, task_id: u64) {
        if let Some((status, idx)) = self.board.order().position(task_id) {
            self.selected_column = status.column();
            self.selected_card = idx;
        } else {
            self.clamp_selection();
        }
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
        self.status_is_error = false;
    }

    fn set_error_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
        self.status_is_error = true;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
        self.status_is_error = false;
    }

    fn apply_filter(&mut self, filter: TaskFilter) {
        self.board.set_filter(filter);
        self.clamp_selection();
    }

    fn update_search(&mut self) {
        let filter = TaskFilter {
            search: self.filter_text.clone(),
            ..self.board.filter().clone()
        };
        self.apply_filter(filter);
    }

    fn toggle_priority(&mut self, priority: Priority) {
        let mut filter = self.board.filter().clone();
        filter.toggle_priority(priority);
        let shown = filter.priorities.contains(&priority);
        self.apply_filter(filter);
        if shown {
            self.set_status_message(format!("Showing {} priority", priority.label().to_lowercase()));
        } else {
            self.set_status_message(format!("Priority filter {} removed", priority.label().to_lowercase()));
        }
    }

    /// Move the selected card one column left or right, to the top.
    fn move_card(&mut self, forward: bool) {
        let Some(task_id) = self.selected_task_id() else {
            return;
        };
        let from = self.selected_status();
        let target = if forward {
            self.selected_column + 1
        } else {
            match self.selected_column.checked_sub(1) {
                Some(c) => c,
                None => return,
            }
        };
        let Some(&to) = Status::ALL.get(target) else {
            return;
        };
        self.submit_move(Move {
            task_id,
            from,
            to,
            index: 0,
        });
    }

    /// Reorder the selected card inside its column. Local only.
    fn shift_card(&mut self, up: bool) {
        let Some(task_id) = self.selected_task_id() else {
            return;
        };
        let index = if up {
            match self.selected_card.checked_sub(1) {
                Some(i) => i,
                None => return,
            }
        } else {
            self.selected_card + 1
        };
        let status = self.selected_status();
        self.submit_move(Move {
            task_id,
            from: status,
            to: status,
            index,
        });
    }

    fn submit_move(&mut self, mv: Move) {
        match self.board.begin_move(mv) {
            Ok(Some(update)) => {
                let api = Arc::clone(&self.api);
                let tx = self.tx.clone();
                self.runtime.spawn(async move {
                    let result = api.update_task(update.task_id, &update.patch).await;
                    let _ = tx.send(Completion::Move {
                        task_id: update.task_id,
                        result,
                    });
                });
                self.set_status_message(format!("Moving #{} to {}…", mv.task_id, mv.to.title()));
            }
            Ok(None) => {}
            Err(e) => self.set_error_message(e.to_string()),
        }
        self.follow_task(mv.task_id);
    }

    fn request_refresh(&mut self) {
        if self.refreshing {
            return;
        }
        self.refreshing = true;
        let api = Arc::clone(&self.api);
        let params = self.params.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = fetch_all_tasks(api.as_ref(), &params).await;
            let _ = tx.send(Completion::Refresh(result));
        });
        self.set_status_message("Refreshing…");
    }

    /// Apply whatever background requests have settled since the last tick.
    fn drain_completions(&mut self) {
        while let Ok(completion) = self.rx.try_recv() {
            match completion {
                Completion::Move { task_id, result } => {
                    if self.board.finish(task_id, result).is_ok() {
                        self.set_status_message(format!("Task #{task_id} saved"));
                    }
                }
                Completion::Refresh(Ok(tasks)) => {
                    self.refreshing = false;
                    let count = tasks.len();
                    let keep = self.selected_task_id();
                    self.board.replace_tasks(tasks);
                    match keep {
                        Some(id) => self.follow_task(id),
                        None => self.clamp_selection(),
                    }
                    self.set_status_message(format!("Loaded {count} tasks"));
                }
                Completion::Refresh(Err(e)) => {
                    self.refreshing = false;
                    tracing::warn!(error = %e, "board refresh failed");
                    self.set_error_message(format!("Refresh failed: {e}"));
                }
            }
        }
        let notices = self.board.take_notices();
        if notices.is_empty() {
            return;
        }
        let is_error = notices.iter().any(|n| n.level == NoticeLevel::Error);
        let message = notices
            .into_iter()
            .map(|n| n.message)
            .collect::<Vec<_>>()
            .join(" | ");
        if is_error {
            self.set_error_message(message);
        } else {
            self.set_status_message(message);
        }
    }

    /// Handle keyboard input
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if self.filter_active {
                    match key.code {
                        KeyCode::Esc => {
                            self.filter_active = false;
                            self.filter_text.clear();
                            self.update_search();
                            self.clear_status_message();
                        }
                        KeyCode::Enter => {
                            self.filter_active = false;
                            if self.filter_text.is_empty() {
                                self.set_status_message("Filter cleared");
                            } else {
                                let shown: usize = Status::ALL
                                    .iter()
                                    .map(|&s| self.board.order().column(s).len())
                                    .sum();
                                self.set_status_message(format!(
                                    "Filter: '{}' ({} tasks shown)",
                                    self.filter_text, shown
                                ));
                            }
                        }
                        KeyCode::Backspace => {
                            if self.filter_text.pop().is_some() {
                                self.update_search();
                            }
                        }
                        KeyCode::Char(c) => {
                            self.filter_text.push(c);
                            self.update_search();
                        }
                        _ => {}
                    }
                    return Ok(false);
                }

                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(true),

                    KeyCode::Enter => {
                        self.show_task_detail = !self.show_task_detail;
                    }

                    KeyCode::Left if key.modifiers.contains(KeyModifiers::CONTROL) => self.move_card(false),
                    KeyCode::Right if key.modifiers.contains(KeyModifiers::CONTROL) => self.move_card(true),
                    KeyCode::Up if key.modifiers.contains(KeyModifiers::SHIFT) => self.shift_card(true),
                    KeyCode::Down if key.modifiers.contains(KeyModifiers::SHIFT) => self.shift_card(false),

                    KeyCode::Left => {
                        if self.selected_column > 0 {
                            self.selected_column -= 1;
                            self.clamp_selection();
                        }
                    }
                    KeyCode::Right => {
                        if self.selected_column < Status::ALL.len() - 1 {
                            self.selected_column += 1;
                            self.clamp_selection();
                        }
                    }
                    KeyCode::Up => {
                        self.selected_card = self.selected_card.saturating_sub(1);
                    }
                    KeyCode::Down => {
                        let column_len = self.board.order().column(self.selected_status()).len();
                        if self.selected_card + 1 < column_len {
                            self.selected_card += 1;
                        }
                    }

                    KeyCode::Char('1') => self.toggle_priority(Priority::Low),
                    KeyCode::Char('2') => self.toggle_priority(Priority::Medium),
                    KeyCode::Char('3') => self.toggle_priority(Priority::High),
                    KeyCode::Char('x') => {
                        self.filter_text.clear();
                        self.apply_filter(TaskFilter::default());
                        self.set_status_message("Filters cleared");
                    }
                    KeyCode::Char('r') => self.request_refresh(),
                    KeyCode::Char('/') => {
                        self.filter_active = true;
                        self.set_status_message("Filter: type to search titles, Enter to apply, Esc to cancel");
                    }
                    KeyCode::Char('h') => {
                        self.set_status_message(
                            "Help: Ctrl+←/→: Move | Shift+↑/↓: Reorder | Enter: Details | /: Search | 1-3: Priority | x: Clear | r: Refresh | q: Quit",
                        );
                    }
                    _ => {}
                }
            }
        }
        Ok(false)
    }

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_board(f, chunks[1]);
        self.render_status_bar(f, chunks[2]);

        if self.show_task_detail {
            self.render_task_detail_popup(f);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let total = self.board.cache().len();
        let in_flight = self.board.in_flight_count();
        let mut spans = vec![
            Span::styled("KANBAN", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("{}  ({} tasks)", self.title, total),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ];
        if in_flight > 0 {
            spans.push(Span::styled(
                format!("  saving {in_flight}…"),
                Style::default().fg(Color::Magenta),
            ));
        }

        let header = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn render_board(&mut self, f: &mut Frame, area: Rect) {
        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(area);

        for (i, &column_area) in columns_layout.iter().enumerate() {
            self.render_column(f, column_area, Status::ALL[i]);
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, status: Status) {
        let column_index = status.column();
        let is_selected = column_index == self.selected_column;
        let color = status_color(status);
        let ids = self.board.order().column(status).to_vec();

        let border_style = if is_selected {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({})", status.title(), ids.len()))
            .border_style(border_style);

        let inner = block.inner(area);
        f.render_widget(block, area);

        if ids.is_empty() {
            return;
        }

        let card_height = 5;
        let available_height = inner.height as usize;
        let visible_cards = available_height / card_height;

        let scroll_offset = if is_selected {
            let start_visible = self.column_scroll_offsets[column_index];
            let end_visible = start_visible + visible_cards;
            if self.selected_card < start_visible {
                self.column_scroll_offsets[column_index] = self.selected_card;
                self.selected_card
            } else if self.selected_card >= end_visible && visible_cards > 0 {
                let new_offset = self.selected_card + 1 - visible_cards;
                self.column_scroll_offsets[column_index] = new_offset;
                new_offset
            } else {
                start_visible
            }
        } else {
            self.column_scroll_offsets[column_index].min(ids.len().saturating_sub(1))
        };

        let mut current_y = 0;
        let mut rendered_cards = 0;
        for (card_index, &task_id) in ids.iter().enumerate().skip(scroll_offset) {
            let Some(task) = self.board.cache().get(task_id) else {
                continue;
            };
            if current_y + card_height > available_height {
                break;
            }
            let card_area = Rect {
                x: inner.x,
                y: inner.y + current_y as u16,
                width: inner.width,
                height: card_height as u16,
            };
            let selected = is_selected && card_index == self.selected_card;
            self.render_card(f, card_area, task, color, selected);
            current_y += card_height;
            rendered_cards += 1;
        }

        if scroll_offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{scroll_offset} above")).style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { height: 1, ..inner });
        }
        let remaining = ids.len().saturating_sub(scroll_offset + rendered_cards);
        if remaining > 0 {
            let indicator = Paragraph::new(format!("▼ +{remaining} below")).style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect {
                    y: inner.y + inner.height.saturating_sub(1),
                    height: 1,
                    ..inner
                },
            );
        }
    }

    fn render_card(&self, f: &mut Frame, area: Rect, task: &Task, color: Color, is_selected: bool) {
        let pending = self.board.is_in_flight(task.id);
        let style = if is_selected {
            Style::default().bg(color).fg(text_on(color)).add_modifier(Modifier::BOLD)
        } else if pending {
            Style::default().bg(DARK_PURPLE)
        } else {
            Style::default().bg(Color::DarkGray)
        };

        let mut card_text = vec![Line::from(vec![
            Span::raw(format!("#{} ", task.id)),
            Span::styled(
                task.priority.label(),
                Style::default().fg(priority_color(task.priority)),
            ),
        ])];

        let available_width = area.width.saturating_sub(2) as usize;
        let mut current_line = String::new();
        let mut lines = Vec::new();
        for word in task.title.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + 1 + word.chars().count() <= available_width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = word.to_string();
                if lines.len() >= 2 {
                    break;
                }
            }
        }
        if !current_line.is_empty() && lines.len() < 2 {
            lines.push(current_line);
        }
        card_text.extend(lines.into_iter().map(Line::from));

        let today = chrono::Local::now().date_naive();
        card_text.push(Line::from(format!(
            "{} | {}",
            format_due_relative(task.due_date, today),
            scope_label(task)
        )));

        let card = Paragraph::new(card_text)
            .block(Block::default().borders(Borders::ALL))
            .style(style)
            .wrap(Wrap { trim: true });
        f.render_widget(card, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if self.filter_active {
            format!("Filter: {} | Type to search, Enter to apply, Esc to cancel", self.filter_text)
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let filter = self.board.filter();
            let mut indicators = String::new();
            if !filter.search.is_empty() {
                indicators.push_str(&format!(" [Search: {}]", filter.search));
            }
            if !filter.priorities.is_empty() {
                let labels: Vec<&str> = filter.priorities.iter().map(|p| p.label()).collect();
                indicators.push_str(&format!(" [Priority: {}]", labels.join(",")));
            }
            format!(
                "{}{} | Ctrl+←/→: Move | /: Search | 1-3: Priority | r: Refresh | h: Help",
                self.selected_status().title(),
                indicators
            )
        };

        let bg = if self.status_is_error {
            DARK_RED
        } else {
            status_color(self.selected_status())
        };
        let status = Paragraph::new(status_text)
            .style(Style::default().bg(bg).fg(text_on(bg)))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    fn render_task_detail_popup(&self, f: &mut Frame) {
        let Some(task) = self.selected_task_id().and_then(|id| self.board.cache().get(id)) else {
            return;
        };

        let popup_area = {
            let area = f.area();
            let popup_width = (area.width * 80) / 100;
            let popup_height = (area.height * 80) / 100;
            let x = (area.width - popup_width) / 2;
            let y = (area.height - popup_height) / 2;
            Rect::new(x, y, popup_width, popup_height)
        };
        f.render_widget(Clear, popup_area);

        let money = match (&task.cost_amount, &task.cost_currency) {
            (Some(amount), Some(currency)) => format!("{amount} {currency}"),
            (Some(amount), None) => amount.clone(),
            _ => "-".to_string(),
        };
        let detail_lines = vec![
            Line::from(vec![Span::styled(
                format!("Task #{}: {}", task.id, task.title),
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(format!("Status:    {}", task.status.title())),
            Line::from(format!("Priority:  {}", task.priority.label())),
            Line::from(format!("Start:     {}", format_date(task.start_date))),
            Line::from(format!("Due:       {}", format_date(task.due_date))),
            Line::from(format!("Scope:     {}", scope_label(task))),
            Line::from(format!("Estimate:  {}", task.est_hours.as_deref().map_or("-".to_string(), |h| format!("{h} h")))),
            Line::from(format!("Cost:      {money}")),
            Line::from(""),
            Line::from("Description:"),
            Line::from(task.description.as_deref().unwrap_or("-")),
        ];

        let popup_block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Press Enter to close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(status_color(task.status)).add_modifier(Modifier::BOLD));
        let popup = Paragraph::new(detail_lines)
            .block(popup_block)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, popup_area);
    }

    /// Main event loop. Blocks the calling thread until the user quits.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            self.drain_completions();
            terminal.draw(|f| self.render(f))?;
            if self.handle_input()? {
                break;
            }
        }
        if self.board.in_flight_count() > 0 {
            tracing::info!(pending = self.board.in_flight_count(), "leaving board with changes in flight");
        }
        Ok(())
    }
}

fn scope_label(task: &Task) -> String {
    match task.scope() {
        TaskScope::Project(id) => task.project_name.clone().unwrap_or_else(|| format!("project {id}")),
        TaskScope::Funding(id) => task.funding_name.clone().unwrap_or_else(|| format!("funding {id}")),
        TaskScope::ProjectFunding(id) => format!("project funding {id}"),
        TaskScope::Unassigned => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_api::MemoryApi;
    use crate::task::tests::task;

    fn app(tasks: Vec<Task>) -> BoardApp {
        let api: Arc<dyn TaskApi> = Arc::new(MemoryApi::new(tasks.clone()));
        BoardApp::new(
            KanbanBoard::new(tasks),
            api,
            TaskListParams::default(),
            Handle::current(),
            "Test board",
        )
    }

    #[tokio::test]
    async fn test_every_rejected_move_reaches_status_bar() {
        let mut app = app(vec![task(1, Status::Todo), task(2, Status::Todo)]);
        for id in [1, 2] {
            app.board
                .begin_move(Move {
                    task_id: id,
                    from: Status::Todo,
                    to: Status::Done,
                    index: 0,
                })
                .unwrap();
            app.tx
                .send(Completion::Move {
                    task_id: id,
                    result: Err(ApiError::NotFound(id)),
                })
                .unwrap_or_else(|_| panic!("channel closed"));
        }

        app.drain_completions();
        assert!(app.status_is_error);
        assert!(app.status_message.contains("Could not move task 1"));
        assert!(app.status_message.contains("Could not move task 2"));
        assert!(app.board.take_notices().is_empty());
    }

    #[tokio::test]
    async fn test_saved_move_reports_success() {
        let mut app = app(vec![task(1, Status::Todo)]);
        app.board
            .begin_move(Move {
                task_id: 1,
                from: Status::Todo,
                to: Status::Doing,
                index: 0,
            })
            .unwrap();
        app.tx
            .send(Completion::Move {
                task_id: 1,
                result: Ok(task(1, Status::Doing)),
            })
            .unwrap_or_else(|_| panic!("channel closed"));

        app.drain_completions();
        assert!(!app.status_is_error);
        assert_eq!(app.status_message, "Task #1 saved");
    }
}
