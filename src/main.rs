//! Binary entry point: set up logging, then hand the parsed CLI off to the
//! command handler.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the `--log-level` flag.
fn init_logging(cli_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = ci_pilot::cli::parse_cli();
    init_logging(&cli.log_level);
    ci_pilot::cli::run_with_cli(cli).await
}
