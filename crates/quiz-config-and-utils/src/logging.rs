//! Logging initialization.
//!
//! Thin wrapper over the observability package so every binary logs to
//! `<base_dir>/logs/certprep.jsonl` with the same service name.

use crate::Paths;
use observability::LogConfig;

/// Initialize the logging system.
///
/// * `level` - default level (trace, debug, info, warn, error); `RUST_LOG` wins
/// * `also_stderr` - echo compact lines to stderr for foreground runs
///
/// ```ignore
/// init_logging("info", &paths, false);
/// tracing::info!("certprep started");
/// ```
pub fn init_logging(level: &str, paths: &Paths, also_stderr: bool) {
    observability::init_with_config(LogConfig {
        service_name: "certprep".into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}
