//! Screen power payload.

use serde::Deserialize;

/// `ScreenResponse` payload. `state` is the screen power after the command
/// (`true` = on) and is only meaningful when `success` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScreenData {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub state: bool,
}
