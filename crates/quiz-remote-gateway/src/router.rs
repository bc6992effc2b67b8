//! Active base URL selection.

use parking_lot::RwLock;
use tracing::info;

/// Holds the base URL requests currently go to.
///
/// Starts at the default and only changes through [`set`](Self::set) and
/// [`reset`](Self::reset); concurrent writers race, last write wins.
#[derive(Debug)]
pub struct BaseUrlRouter {
    default: String,
    current: RwLock<String>,
}

impl BaseUrlRouter {
    pub fn new(default: impl Into<String>) -> Self {
        let default = default.into();
        Self {
            current: RwLock::new(default.clone()),
            default,
        }
    }

    pub fn current(&self) -> String {
        self.current.read().clone()
    }

    pub fn default_url(&self) -> &str {
        &self.default
    }

    pub fn set(&self, url: impl Into<String>) {
        let url = url.into();
        let mut current = self.current.write();
        if *current != url {
            info!(from = %*current, to = %url, "Switching active server");
            *current = url;
        }
    }

    pub fn reset(&self) {
        self.set(self.default.clone());
    }

    pub fn is_default(&self) -> bool {
        *self.current.read() == self.default
    }
}
