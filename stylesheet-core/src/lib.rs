//! Core logic for loading CSS stylesheets into a live document.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod detect;
mod host;
mod loader;

pub use detect::DetectionStrategy;
pub use host::{Clock, FailureOf, LinkSignal, StyleHost, StyleLink};
#[cfg(not(target_arch = "wasm32"))]
pub use host::TokioClock;
pub use loader::{LoaderContext, StyleSheetLoader};

/// Message used when the link reports an error without any detail.
pub const GENERIC_LOAD_ERROR: &str = "Error loading CSS file.";

/// Request to load one stylesheet, addressed by URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StyleSheetRequest {
    pub address: String,
}

impl StyleSheetRequest {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Timings and overrides for the loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoaderConfig {
    /// Hard limit (ms) before a pending load is rejected.
    pub timeout_ms: u64,
    /// Interval (ms) between stylesheet list scans in polling mode.
    pub poll_interval_ms: u64,
    /// Delay (ms) after a load or error signal before resolving.
    pub grace_ms: u64,
    /// Forces a detection strategy instead of probing the platform.
    #[serde(default)]
    pub detection: Option<DetectionStrategy>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 100_000,
            poll_interval_ms: 10,
            grace_ms: 7,
            detection: None,
        }
    }
}

impl LoaderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

/// Hrefs of the stylesheets that were already linked when the loader started.
///
/// The set is captured once and never refreshed: stylesheets attached later
/// by other means are not seen here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownStylesheets {
    hrefs: HashSet<String>,
}

impl KnownStylesheets {
    pub fn contains(&self, address: &str) -> bool {
        self.hrefs.contains(address)
    }

    pub fn len(&self) -> usize {
        self.hrefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hrefs.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KnownStylesheets {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            hrefs: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Reasons a stylesheet load can fail.
///
/// `F` is the host's error payload, carried as-is in `BrowserLoad::cause`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError<F> {
    #[error("Unable to load CSS")]
    Timeout,
    #[error("{message}")]
    BrowserLoad { message: String, cause: Option<F> },
    #[error("Host error: {0}")]
    Host(String),
}
