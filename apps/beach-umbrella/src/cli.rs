use clap::{Args, Parser};
use std::path::PathBuf;

use crate::config::{BACKEND_URL_ENV, Config, ConfigError, HISTORY_BUDGET_ENV};
use crate::telemetry::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "umbrella",
    about = "☂️  Terminal client for an umbrella shell backend",
    author,
    version
)]
pub struct Cli {
    #[arg(
        long,
        value_name = "URL",
        env = BACKEND_URL_ENV,
        help = "WebSocket url of the backend (ws:// or wss://)"
    )]
    pub backend: Option<String>,

    #[arg(
        long,
        value_name = "PATH",
        env = "UMBRELLA_CONFIG",
        help = "Config file to load instead of ~/.umbrella/config.toml"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long = "history-budget",
        value_name = "UNITS",
        env = HISTORY_BUDGET_ENV,
        help = "Scrollback size, in rows, before history eviction is requested"
    )]
    pub history_budget: Option<u32>,

    #[arg(
        long,
        help = "Run without touching the terminal; the screen is written to the log"
    )]
    pub headless: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl Cli {
    /// Config file and environment, with this command line on top.
    pub fn resolve_config(&self) -> Result<Config, ConfigError> {
        Ok(Config::load(self.config.as_deref())?
            .with_overrides(self.backend.clone(), self.history_budget))
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "UMBRELLA_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "UMBRELLA_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test_timeout::timeout]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test_timeout::timeout]
    fn flags_parse_into_overrides() {
        let cli = Cli::try_parse_from([
            "umbrella",
            "--backend",
            "ws://example.test/term",
            "--history-budget",
            "250",
            "--headless",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.backend.as_deref(), Some("ws://example.test/term"));
        assert_eq!(cli.history_budget, Some(250));
        assert!(cli.headless);
        assert_eq!(cli.logging.to_config().level, LogLevel::Debug);
    }
}
