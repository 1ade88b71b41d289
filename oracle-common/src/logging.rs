use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

/// Target carrying round lifecycle audit events (`EVENT:*` lines).
pub const AUDIT_TARGET: &str = "consensus";

/// Installs the global subscriber: stdout filtered by `RUST_LOG`, plus an ANSI-free
/// audit file under `log_dir` that only receives `consensus` events.
///
/// The returned guard must be held for the life of the process or buffered audit
/// lines are lost.
pub fn init_logging(process_name: &str, log_dir: &Path, default_filter: &str) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::never(log_dir, format!("audit-{}.log", process_name));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let audit_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target() == AUDIT_TARGET
        }));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        );

    tracing_subscriber::registry()
        .with(audit_layer)
        .with(stdout_layer)
        .init();

    Ok(guard)
}
