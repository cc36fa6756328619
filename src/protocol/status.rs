//! Generic acknowledgement payload.

use serde::Deserialize;

/// Payload of every plain acknowledgement (`SuccessResponse`, `KeyResponse`,
/// `StartActivityResponse`, `SwitchTaskResponse`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SuccessData {
    #[serde(default)]
    pub success: bool,
}
