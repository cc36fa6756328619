//! Link settings.

use std::time::Duration;

use serde::Deserialize;

use crate::frame::DEFAULT_DELIMITER;

/// Default board control endpoint.
pub const DEFAULT_ADDR: &str = "192.168.1.100:6000";

/// Connection and request settings for one board.
///
/// Every field is optional when loaded with [`from_json`](Self::from_json):
///
/// ```text
/// {"addr":"10.0.0.7:6000","connectTimeoutMs":2000}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkConfig {
    pub addr: String,
    pub delimiter: String,
    pub connect_timeout_ms: u64,
    /// Deadline used by [`BoardLink::request`](crate::link::BoardLink::request).
    pub request_timeout_ms: u64,
}

impl LinkConfig {
    /// Parse a camelCase JSON config. Missing fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            delimiter: DEFAULT_DELIMITER.to_owned(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: 3_000,
        }
    }
}
