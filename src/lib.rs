//! Client library for the project tracker REST API.
//!
//! - [`api`]: typed access to tasks, projects and fundings, behind the
//!   [`api::TaskApi`] trait.
//! - [`analytics`]: the project overview snapshot, a pure function of the task
//!   list, the project's date window and today's date.
//! - [`board`] and [`timeline`]: kanban and timeline views that apply changes
//!   optimistically and roll them back when the server rejects them.
//! - [`cmd`] and [`tui`]: the `pt` command line and the interactive board.

pub mod analytics;
pub mod api;
pub mod board;
pub mod cache;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod dates;
pub mod error;
pub mod fields;
pub mod filter;
pub mod memory_api;
pub mod project;
pub mod task;
pub mod timeline;
pub mod tui {
    pub mod board;
    pub mod board_run;
    pub mod colors;
}
