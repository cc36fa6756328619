//! Discriminant extraction without a full decode.
//!
//! The `type` field selects the payload schema, so it has to be readable
//! before we know which schema to decode with, and even when the rest of
//! the line is something the full decoder would reject.

use serde::Deserialize;
use serde_json::Value;

/// Routing fields of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub type_name: String,
    pub result_id: Option<String>,
}

/// Header-only view; serde skips every other field without validating it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaderFields {
    #[serde(rename = "type")]
    type_name: Option<Value>,
    result_id: Option<Value>,
}

impl Header {
    /// Extract `type` and `resultId` from a raw line.
    ///
    /// Well-formed JSON is read with a header-only serde view. Anything else
    /// (truncated lines, stray trailing bytes) falls back to scanning for the
    /// two fields directly. Returns `None` when no usable `type` is found.
    pub fn peek(raw: &str) -> Option<Self> {
        match serde_json::from_str::<HeaderFields>(raw) {
            Ok(fields) => {
                let type_name = fields.type_name.and_then(as_text)?;
                if type_name.is_empty() {
                    return None;
                }
                Some(Self { type_name, result_id: fields.result_id.and_then(as_text) })
            }
            Err(_) => {
                let type_name = scan_field(raw, "type")?;
                if type_name.is_empty() {
                    return None;
                }
                Some(Self { type_name, result_id: scan_field(raw, "resultId") })
            }
        }
    }
}

fn as_text(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Find `"key" : <string-or-number>` among the top-level fields of `raw`.
///
/// Braces and brackets outside string literals are counted, so a key of the
/// same name inside `value` is skipped. Only the value's own token has to be
/// well formed; what follows it is never looked at.
fn scan_field(raw: &str, key: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            b'"' => {
                let end = i + closing_quote(&raw[i..])?;
                if depth == 1
                    && raw[i + 1..end] == *key
                    && let Some(rest) = raw[end + 1..].trim_start().strip_prefix(':')
                {
                    return scan_value(rest.trim_start());
                }
                i = end;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// A string or integer token at the start of `rest`.
fn scan_value(rest: &str) -> Option<String> {
    if rest.starts_with('"') {
        let end = closing_quote(rest)?;
        // Let serde_json handle escape sequences inside the literal.
        return serde_json::from_str::<String>(&rest[..=end]).ok();
    }
    let digits: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    (!digits.is_empty()).then_some(digits)
}

/// Byte index of the quote closing the string literal that opens `s`.
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, b) in s.bytes().enumerate().skip(1) {
        match b {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'"' => return Some(i),
            _ => {}
        }
    }
    None
}
