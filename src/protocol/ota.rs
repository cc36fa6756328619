//! Update-server (OTA) configuration payload.

use serde::Deserialize;

/// `OtaHostsResponse` payload: the update servers the board polls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OtaHostsData {
    #[serde(default)]
    pub hosts: Vec<String>,
}
