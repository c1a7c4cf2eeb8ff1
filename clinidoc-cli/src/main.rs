//! clinidoc CLI entry point.
//!
//! Initializes logging (console plus a `run.log` per output directory) and
//! delegates to the CLI module for command handling.

mod cli;
mod run_log;

use run_log::RunLogLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::parse_cli();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(RunLogLayer::new())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(RunLogLayer::new())
            .with(filter)
            .init();
    }

    let code = cli::run_with_cli(cli).await?;
    std::process::exit(code);
}
