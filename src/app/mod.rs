pub mod config;
pub mod inspect;
pub mod logging_system;

pub use config::{
    Cli, Command, ConfigError, DispatcherConfig, DrainArgs, InspectArgs, LogLevel, TuningConfig,
};
pub use logging_system::{LoggingError, LoggingSystem, setup_logging_safe};

use crate::pipeline::DeliveryQueue;
use crate::reliability::BatchStore;
use crate::sender::{BatchTransmitter, HttpClient};
use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

async fn run_inspect(args: &InspectArgs) -> anyhow::Result<()> {
    let store = BatchStore::open(&args.work_dir).await;
    let reports = inspect::inspect_queue(&store)
        .await
        .with_context(|| format!("Failed to inspect {}", args.work_dir.display()))?;

    let mut stdout = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &reports)?;
        std::io::Write::write_all(&mut stdout, b"\n")?;
    } else {
        inspect::write_table(&mut stdout, &reports)?;
    }
    Ok(())
}

async fn run_drain(args: &DrainArgs) -> anyhow::Result<()> {
    let config = args.dispatcher_config()?;
    let store = BatchStore::open(&config.work_dir).await;
    let client = HttpClient::new(config.client_config())?;
    let mut queue = DeliveryQueue::new(
        store,
        BatchTransmitter::new(client.clone()),
        config.install_id,
        config.tuning.max_files_per_cycle,
        config.tuning.storage_cap(),
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let drained = queue.drain(&cancel).await;
    let stats = client.connection_stats();
    if drained {
        info!(requests = stats.total_requests, "Queue drained");
        Ok(())
    } else {
        warn!(
            remaining = queue.pending().len(),
            failed_requests = stats.failed_requests,
            "Collector unreachable, files left queued"
        );
        anyhow::bail!("{} batch files left undelivered", queue.pending().len())
    }
}

pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::from_args(std::env::args_os()).unwrap_or_else(|e| e.exit());

    if let Err(e) = setup_logging_safe(cli.log_level, cli.json_logs) {
        eprintln!("Warning: {e}");
    }
    info!("Starting event-courier v{}", get_version());

    match &cli.command {
        Command::Inspect(args) => run_inspect(args).await,
        Command::Drain(args) => run_drain(args).await,
    }
}
