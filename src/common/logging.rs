//! Logging and tracing configuration
//!
//! Timeouts in this crate degrade to `false`/empty results, so the log is the
//! only place a timed-out wait and a wait that never fired can be told apart.

use std::path::{Path, PathBuf};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Initialize tracing to stdout
///
/// Log level is controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("canoe_bridge=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing to stdout plus a log file in `log_dir`
///
/// Returns the log file path, or `None` if the directory could not be created
/// (stdout logging is still installed in that case).
pub fn init_with_file(log_dir: &Path) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("canoe_bridge=debug,info"));

    if std::fs::create_dir_all(log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(log_dir, "canoe-bridge.log");

        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        let stdout_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(stdout_layer)
            .init();

        return Some(log_dir.join("canoe-bridge.log"));
    }

    eprintln!("Warning: could not create log directory {}", log_dir.display());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).compact())
        .init();
    None
}
