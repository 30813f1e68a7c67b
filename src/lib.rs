pub mod adherence; // Refill gaps, possession timeline, MPR projection, flags
pub mod cache; // Per-patient report cache
pub mod cli; // JSON request/report front end
pub mod config;
pub mod models;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Reports go to stdout; logs stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    cli::execute(cli::Cli::parse())?;
    Ok(())
}
