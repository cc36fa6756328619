use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors arising from parsing inbound board messages.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("message has no `type` discriminant{}", format_raw_suffix(raw))]
    MissingType {
        /// Leading characters of the offending line for debug context.
        raw: String,
    },

    #[error("no schema registered for `{type_name}`")]
    UnknownType { type_name: String },

    #[error("failed to decode {type_name}: {source}{}", format_raw_suffix(raw))]
    Decode {
        type_name: String,
        #[source]
        source: serde_json::Error,
        /// Leading characters of the offending line for debug context.
        raw: String,
    },
}

impl WireError {
    pub(crate) fn missing_type(raw: &str) -> Self {
        Self::MissingType { raw: clip(raw) }
    }

    pub(crate) fn decode(type_name: &str, source: serde_json::Error, raw: &str) -> Self {
        Self::Decode { type_name: type_name.to_owned(), source, raw: clip(raw) }
    }
}

/// Errors from sending commands or driving a [`BoardLink`](crate::link::BoardLink).
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("transport is not connected")]
    NotConnected,

    #[error("board link has shut down")]
    Closed,

    #[error("no `{type_name}` reply for resultId `{result_id}` within {timeout:?}")]
    Timeout { type_name: String, result_id: String, timeout: Duration },

    #[error("protocol error: {0}")]
    Protocol(String),
}

const RAW_LIMIT: usize = 64;

fn clip(raw: &str) -> String {
    match raw.char_indices().nth(RAW_LIMIT) {
        Some((idx, _)) => format!("{}...", &raw[..idx]),
        None => raw.to_owned(),
    }
}

/// Format raw text as a suffix like ` | {"type":...` (empty if no text).
fn format_raw_suffix(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    format!(" | {raw}")
}

pub type Result<T> = std::result::Result<T, WireError>;
