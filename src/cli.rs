use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::cmd::Commands;
use crate::config::{ClientConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};

/// Command-line client for the project tracker API.
/// Every connection flag can also be set through its `PT_*` environment variable.
#[derive(Parser)]
#[command(name = "pt", version, about = "Project tracker client: tasks, boards and project analytics")]
pub struct Cli {
    /// Base URL of the tracker server.
    #[arg(long, global = true, env = "PT_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// CSRF token sent with mutating requests.
    #[arg(long, global = true, env = "PT_CSRF_TOKEN", hide_env_values = true)]
    pub csrf_token: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true, env = "PT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_url.clone())
            .with_csrf_token(self.csrf_token.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }

    /// Default log filter for the verbosity flag.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "project_tracker=debug,pt=debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Status;

    #[test]
    fn test_parse_move_with_connection_flags() {
        let cli = Cli::try_parse_from([
            "pt", "--api-url", "https://tracker.example/", "--timeout-secs", "5", "-v", "move", "12", "doing",
        ])
        .unwrap();
        let config = cli.client_config();
        assert_eq!(config.api_root(), "https://tracker.example");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(cli.log_filter(), "project_tracker=debug,pt=debug");
        match cli.command {
            Commands::Move { id, to, position } => {
                assert_eq!(id, 12);
                assert_eq!(to, Status::Doing);
                assert_eq!(position, 0);
            }
            _ => panic!("expected move"),
        }
    }
}
