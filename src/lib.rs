pub mod commands;
pub mod core;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;
use crate::core::error::ProvisionResult;

pub async fn run() -> ProvisionResult<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,provisioner_lib=debug")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("Provisioner {} starting...", env!("CARGO_PKG_VERSION"));

    commands::execute(cli).await
}
