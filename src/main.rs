//! # pt - Project Tracker CLI
//!
//! Command-line and terminal client for the project tracker server: list and
//! edit tasks, print a project's dashboard, and work its kanban board or
//! timeline.
//!
//! ## Quick Start
//!
//! ```bash
//! # Point the client at a server (or pass --api-url)
//! export PT_API_URL=https://tracker.example.org
//!
//! # Tasks of project 4, highest priority first
//! pt list --project 4 --ordering priority-desc
//!
//! # Add a task with natural dates
//! pt add "Order solar panels" --project 4 --start today --due "in 2w"
//!
//! # Dashboard: progress, risk, momentum, forecast
//! pt overview 4
//!
//! # Move a card, or open the interactive board
//! pt move 17 doing
//! pt ui 4
//! ```
//!
//! ## Key Commands
//!
//! - `pt overview <project>` - Derived metrics for one project
//! - `pt board <project>` / `pt timeline <project>` - Print the board or timeline
//! - `pt move <id> <status>` / `pt reschedule <id>` - Optimistic updates
//! - `pt ui <project>` - Interactive kanban board
//!
//! Logging goes to stderr; set `RUST_LOG` or pass `-v` for more detail.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use project_tracker::api::HttpApi;
use project_tracker::cli::Cli;
use project_tracker::cmd::{cmd_completions, dispatch, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Completions work without a server.
    if let Commands::Completions { shell } = &cli.command {
        return cmd_completions(*shell);
    }

    let config = cli.client_config();
    tracing::debug!(url = %config.api_root(), "using tracker API");
    let api = HttpApi::new(config)?;
    dispatch(api, cli.command).await
}
