//! Subscriber setup for a training process.
//!
//! The library itself only emits `tracing` events through the span carried by
//! [`ExecutionContext`](crate::context::ExecutionContext); binaries call
//! [`init_run_logging`] once to decide where those events go.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// File name of the run log inside the log root.
pub const LOG_FILE_NAME: &str = "train.log.txt";

/// Filter directive for a `-v` count.
pub fn filter_for_verbosity(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install a stderr layer plus a plain-text file layer at
/// `<log_root>/train.log.txt`.
///
/// Keep the returned guard alive for the whole run; dropping it flushes the
/// file writer.
pub fn init_run_logging(log_root: &Path, filter: &str) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_root)?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let file_appender = tracing_appender::rolling::never(log_root, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Stderr-only logging for commands that don't own a run directory.
pub fn init_stderr_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::new(filter))
        .try_init();
}
