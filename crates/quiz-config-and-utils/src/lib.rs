//! Configuration, paths, shared rules and logging setup for certprep.

mod config;
mod error;
mod logging;
mod paths;
mod rules;

pub use config::{Config, RetrySettings, DEFAULT_FALLBACK_HOSTS, DEFAULT_LOG_LEVEL, DEFAULT_SERVER_URL};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
pub use rules::{ProgressionRules, EXAM_ONE_UNLOCK_THRESHOLD};
