use beach_umbrella::cli::Cli;
use beach_umbrella::client::{self, ClientError};
use beach_umbrella::config::ConfigError;
use beach_umbrella::telemetry::logging::{self, InitError};
use clap::Parser;
use std::process;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Logging(#[from] InitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("❌ {err}");
        process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    logging::init(&cli.logging.to_config())?;
    let config = cli.resolve_config()?;
    tracing::debug!(target: "umbrella::main", backend = %config.backend_url, headless = cli.headless, "starting client");
    client::run(config, cli.headless).await?;
    Ok(())
}
