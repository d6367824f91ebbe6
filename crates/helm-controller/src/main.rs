//! Helm controller binary.
//!
//! Converges releases towards the deployment intents found in a directory.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use helm_controller::{ControllerConfig, ControllerService};

/// Level-triggered reconciliation controller for deployment intents.
#[derive(Parser, Debug)]
#[command(name = "helm-controller", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, env = "HELM_CONTROLLER_CONFIG", default_value = "controller.toml")]
    config: PathBuf,

    /// Number of workers; overrides the configuration file.
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("helm_controller=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("helm controller starting");

    let mut config = ControllerConfig::from_file(&cli.config)?;
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    config.validate()?;

    info!(
        workers = config.workers,
        chart = %config.chart.path.display(),
        intents = %config.source.intents_dir.display(),
        backend = ?config.release.backend,
        "configuration loaded"
    );

    ControllerService::new(config).run().await?;
    Ok(())
}
