use anyhow::Result;
use dotenvy::dotenv;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use omni_fathom_exporter::telemetry::{self, TelemetryConfig};
use omni_fathom_exporter::{FathomClient, FathomConfig, RunSummary, SyncManager, TracingProgress};

const EXIT_FATAL: u8 = 1;
const EXIT_PARTIAL: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok();

    let telemetry_config = TelemetryConfig::from_env("omni-fathom-exporter");
    if let Err(e) = telemetry::init_telemetry(telemetry_config) {
        eprintln!("{}", e);
        return ExitCode::from(EXIT_FATAL);
    }

    info!("Starting Fathom transcript export");

    match run().await {
        Ok(summary) if summary.has_failures() => {
            warn!(
                "Export finished with {} failed meeting(s); re-run to retry them",
                summary.failed
            );
            ExitCode::from(EXIT_PARTIAL)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run() -> Result<RunSummary> {
    let config = FathomConfig::from_env()?;

    info!("Base URL: {}", config.base_url);
    info!("Output directory: {}", config.output_dir.display());
    info!("Calendar invitees domains: {}", config.domains_type);
    if let Some(limit) = config.page_limit {
        info!("Page limit: {}", limit);
    }
    if let Some(size) = config.page_size {
        info!("Page size: {}", size);
    }

    let client = FathomClient::new(&config)?;
    let mut manager = SyncManager::new(Arc::new(client), config, Arc::new(TracingProgress));

    Ok(manager.run().await?)
}
