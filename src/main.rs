mod actors;
mod app_system;
mod clients;
mod config;
mod domain;
mod error;
mod flows;
mod messages;
mod shell;
mod storage;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod mock_framework;

use anyhow::Context;
use chrono::Local;
use tokio::io::BufReader;
use tracing::{info, Instrument};

use crate::app_system::{setup_tracing, DeskSystem};
use crate::config::DeskConfig;
use crate::shell::{Shell, ShellSettings, DEFAULT_RECENT_LIMIT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();

    let path = DeskConfig::resolve_path(std::env::args().nth(1));
    let config = DeskConfig::load(&path).context("Failed to load desk configuration")?;

    info!(storage = %config.storage_dir.display(), "Starting order desk");
    let system = DeskSystem::new(&config).await?;

    // Runs alongside the shell; the flag stays optimistic until it answers.
    let status_client = system.client.clone();
    tokio::spawn(
        async move {
            let _ = status_client.fetch_status().await;
        }
        .instrument(tracing::info_span!("status_refresh")),
    );

    let settings = ShellSettings {
        upi_id: config.upi_id.clone(),
        run_text: config.next_run_text(Local::now()),
        recent_limit: DEFAULT_RECENT_LIMIT,
    };
    let shell = Shell::new(system.client.clone(), settings);
    shell
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("Shell I/O failed")?;

    system.shutdown().await.map_err(anyhow::Error::msg)?;
    info!("Order desk closed");
    Ok(())
}
