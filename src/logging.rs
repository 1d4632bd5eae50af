//! Logging initialization
//!
//! Logs go to a daily-rolling file under `./logs` through a non-blocking
//! writer, keeping stdout free for the interactive permission prompt. The
//! `RUST_LOG` environment variable overrides the default `info` filter.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber
///
/// Returns the appender's worker guard; dropping it flushes buffered log
/// lines, so hold it for the lifetime of the program.
pub fn init_logging() -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_appender = tracing_appender::rolling::daily("logs", "agent-sandbox.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    tracing::info!("[Logging] Initialized, writing to ./logs");
    Ok(guard)
}
