//! Main entry point for the variant-annotator CLI

use anyhow::Context;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use variant_annotator::cli::{Cli, CliError};
use variant_annotator::shutdown::ShutdownCoordinator;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("variant_annotator=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing in-flight batches...");
                shutdown.request_shutdown("interrupted by Ctrl+C");
            }
        }
    });

    let result = cli
        .execute(shutdown)
        .await
        .with_context(|| format!("failed to annotate {}", cli.vcf.display()));

    if let Err(e) = result {
        match e.downcast_ref::<CliError>().and_then(CliError::sequence_index) {
            Some(index) => error!(sequence_index = index, "Command failed: {:#}", e),
            None => error!("Command failed: {:#}", e),
        }
        std::process::exit(1);
    }
}
