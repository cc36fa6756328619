//! Volume and mute payloads.

use serde::{Deserialize, Deserializer};

/// Highest volume level the board accepts.
pub const MAX_VOLUME: u8 = 100;

/// `VolumeResponse` payload.
///
/// Fractional levels are rounded and out-of-range levels clamped into
/// `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VolumeData {
    #[serde(deserialize_with = "clamped_level")]
    pub volume: u8,
}

/// `MuteResponse` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteData {
    pub is_mute: bool,
}

fn clamped_level<'de, D>(de: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(de)?;
    Ok(raw.round().clamp(0.0, f64::from(MAX_VOLUME)) as u8)
}
