// Sensicity operator console
// Composition root: configuration, logging, store and auth wiring

use clap::Parser;
use sensicity_console::cli::{self, Cli};
use sensicity_console::{logging, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    logging::init(config.log_format);

    let cli = Cli::parse();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting");

    config.require_persistent_store()?;
    let state = AppState::from_config(&config).await?;
    if config.auth.demo_mode {
        tracing::warn!("Demo mode is enabled: every signed-in user holds every permission");
    }

    let mut stdout = std::io::stdout().lock();
    cli::run(cli.command, &state, &mut stdout).await
}
