//! Release inventory binary.
//!
//! Prints a readiness summary of every deployed release as JSON.

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use release_inventory::{build_report, HttpClusterReader};

/// Summarise the objects of every deployed release.
#[derive(Parser, Debug)]
#[command(name = "release-inventory", version, about)]
struct Cli {
    /// Base URL of the release service.
    #[arg(long, env = "RELEASE_INVENTORY_URL", default_value = "http://localhost:8090")]
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("release_inventory=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!(url = %cli.url, "building release inventory");

    let reader = HttpClusterReader::new(cli.url)?;
    let report = build_report(&reader).await?;
    report.write_json(std::io::stdout().lock())?;
    Ok(())
}
