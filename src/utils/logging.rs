//! Logging initialization
//!
//! Structured JSON logging to stdout and a daily-rolling file. The local log
//! is also the terminal record for incidents that exhausted every
//! notification channel, so file output is not optional.

use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system.
///
/// Logs as JSON with RFC 3339 UTC timestamps, to stdout and to daily files
/// under `LOG_DIR` (default `logs/`, file name `vmwatch.log.YYYY-MM-DD`).
/// The log level comes from `RUST_LOG`, defaulting to `info,vmwatch=debug`.
///
/// The returned `WorkerGuard` must be held in `main`; dropping it flushes
/// buffered log lines on shutdown.
pub fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

    let file_appender = rolling::daily(&log_dir, "vmwatch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stdout_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_current_span(true)
        .flatten_event(false);

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_current_span(true)
        .flatten_event(false)
        .with_ansi(false)
        .with_writer(non_blocking);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vmwatch=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .or_else(|err| {
            // Detect "already initialized" via source downcasting
            use std::error::Error;
            if err
                .source()
                .and_then(|s| s.downcast_ref::<tracing::dispatcher::SetGlobalDefaultError>())
                .is_some()
            {
                // Already initialized; this is safe to ignore
                return Ok(());
            }
            // Other initialization failures should be logged
            eprintln!("Failed to initialize tracing: {}", err);
            Err(err)
        })
        .ok(); // Let the monitor start even if logging fails

    guard
}
