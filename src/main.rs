mod chain;
mod config;
mod db;
mod engine;
mod error;
mod runner;
mod scores;
mod types;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::chain::BetContractGateway;
use crate::config::Config;
use crate::db::MatchStore;
use crate::engine::{UpkeepEngine, UpkeepPolicy};
use crate::error::Result;
use crate::scores::FootballDataClient;

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Held until main returns so the file writer flushes, including the fatal line.
    let _log_guard = init_logging(&cfg);

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!(
        chain_id = cfg.chain_id,
        timeout_days = cfg.timeout_keeper_needed_days,
        "Keeper starting"
    );

    let store = MatchStore::connect(&cfg.db_path).await?;
    let chain = Arc::new(BetContractGateway::new(&cfg)?);
    let scores = Arc::new(FootballDataClient::new(&cfg)?);
    let engine = UpkeepEngine::new(chain, scores, UpkeepPolicy::from_config(&cfg));

    match cfg.cron_interval_secs {
        Some(every_secs) => runner::run_scheduled(&store, &engine, every_secs).await,
        None => {
            runner::run_once(&store, &engine).await?;
        }
    }

    Ok(())
}

/// Stdout always; a plain-text file as well when `KEEPER_LOG_PATH` is set.
/// The returned guard flushes the file writer on drop.
fn init_logging(cfg: &Config) -> Option<WorkerGuard> {
    let (file_layer, guard) = match cfg.log_path.as_deref().map(open_log_file) {
        Some(Ok((writer, guard))) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        ),
        Some(Err(e)) => {
            eprintln!("Warning: file logging disabled: {e}");
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(&cfg.log_level))
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn open_log_file(
    path: &str,
) -> std::io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let path = Path::new(path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "log path has no file name")
    })?;

    // rolling::never panics if it cannot open the file, so check first.
    std::fs::create_dir_all(dir)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
