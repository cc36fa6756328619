//! Message types and decode dispatch.
//!
//! - [`Command`]: lines we send to the board
//! - [`Message`]: lines the board sends to us
//!
//! Every inbound line is a JSON envelope:
//!
//! ```text
//! {"type":"VolumeResponse","resultId":"7","sync":false,"value":{"volume":42}}
//! {"type":"StartActivityResponse","id":"e1","error":{"code":"2","message":"..."}}
//! ```
//!
//! `type` is the discriminant. It selects exactly one payload schema, and
//! [`Message`] has one variant per schema. Several discriminants share a
//! schema (every plain acknowledgement decodes as [`SuccessData`]), so
//! routing always goes by [`Message::type_name`], never by variant.

pub mod audio;
pub mod command;
pub mod header;
pub mod ota;
pub mod packages;
pub mod screen;
pub mod status;
pub mod tasks;
pub mod usb;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

pub use audio::{MuteData, VolumeData};
pub use command::Command;
pub use header::Header;
pub use ota::OtaHostsData;
pub use packages::PackageData;
pub use screen::ScreenData;
pub use status::SuccessData;
pub use tasks::TaskData;
pub use usb::UsbDeviceData;

// ---------------------------------------------------------------------------
// Discriminants
// ---------------------------------------------------------------------------

pub const TYPE_SUCCESS: &str = "SuccessResponse";
pub const TYPE_VOLUME: &str = "VolumeResponse";
pub const TYPE_MUTE: &str = "MuteResponse";
pub const TYPE_SCREEN: &str = "ScreenResponse";
pub const TYPE_KEY: &str = "KeyResponse";
pub const TYPE_START_ACTIVITY: &str = "StartActivityResponse";
pub const TYPE_LIST_TASKS: &str = "ListTasksResponse";
pub const TYPE_FOREGROUND_TASK: &str = "ForegroundTaskResponse";
pub const TYPE_SWITCH_TASK: &str = "SwitchTaskResponse";
pub const TYPE_REMOVE_TASK: &str = "RemoveTaskResponse";
pub const TYPE_LIST_PACKAGES: &str = "ListPackagesResponse";
pub const TYPE_DUMP_USB: &str = "DumpUsbResponse";
pub const TYPE_END_SESSION: &str = "EndSessionResponse";
pub const TYPE_OTA_HOSTS: &str = "OtaHostsResponse";
pub const TYPE_SET_OTA_HOSTS: &str = "SetOtaHostsResponse";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Failure detail reported by the board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorInfo {
    /// Device message, or the code when the board sent no message.
    pub fn describe(&self) -> &str {
        self.message
            .as_deref()
            .or(self.code.as_deref())
            .unwrap_or("unspecified error")
    }
}

/// A decoded inbound message with payload type `T`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response<T> {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub result_id: Option<String>,
    /// Set on board-originated pushes that no request triggered.
    #[serde(default)]
    pub sync: bool,
    #[serde(default = "Option::default")]
    pub value: Option<T>,
    #[serde(default, rename = "id", deserialize_with = "lenient_string")]
    pub error_id: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

impl<T> Response<T> {
    /// The payload, or `None` when the board reported an error.
    pub fn payload(&self) -> Option<&T> {
        if self.error.is_some() {
            return None;
        }
        self.value.as_ref()
    }

    pub fn is_unsolicited(&self) -> bool {
        self.sync
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Accept a string or a bare number (some firmware sends numeric codes/ids).
fn lenient_string<'de, D>(de: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(de)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Message: every schema the board can send
// ---------------------------------------------------------------------------

/// A message the board sends to us, one variant per payload schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Success(Response<SuccessData>),
    Volume(Response<VolumeData>),
    Mute(Response<MuteData>),
    Screen(Response<ScreenData>),
    Task(Response<TaskData>),
    TaskList(Response<Vec<TaskData>>),
    PackageList(Response<Vec<PackageData>>),
    UsbDeviceList(Response<Vec<UsbDeviceData>>),
    OtaHosts(Response<OtaHostsData>),
}

macro_rules! with_response {
    ($msg:expr, $r:ident => $body:expr) => {
        match $msg {
            Message::Success($r) => $body,
            Message::Volume($r) => $body,
            Message::Mute($r) => $body,
            Message::Screen($r) => $body,
            Message::Task($r) => $body,
            Message::TaskList($r) => $body,
            Message::PackageList($r) => $body,
            Message::UsbDeviceList($r) => $body,
            Message::OtaHosts($r) => $body,
        }
    };
}

impl Message {
    pub fn type_name(&self) -> &str {
        with_response!(self, r => r.type_name.as_str())
    }

    pub fn result_id(&self) -> Option<&str> {
        with_response!(self, r => r.result_id.as_deref())
    }

    pub fn is_unsolicited(&self) -> bool {
        with_response!(self, r => r.sync)
    }

    /// The board-reported error, whatever the payload schema.
    pub fn error(&self) -> Option<&ErrorInfo> {
        with_response!(self, r => r.error.as_ref())
    }

    /// Borrow the envelope if it carries payload type `T`.
    pub fn response<T: Payload>(&self) -> Option<&Response<T>> {
        T::from_message(self)
    }
}

/// A payload schema that can be decoded into a [`Message`].
pub trait Payload: DeserializeOwned + Send + Sync + 'static {
    fn into_message(response: Response<Self>) -> Message;
    fn from_message(message: &Message) -> Option<&Response<Self>>;
}

macro_rules! payload {
    ($ty:ty, $variant:ident) => {
        impl Payload for $ty {
            fn into_message(response: Response<Self>) -> Message {
                Message::$variant(response)
            }

            fn from_message(message: &Message) -> Option<&Response<Self>> {
                match message {
                    Message::$variant(r) => Some(r),
                    _ => None,
                }
            }
        }
    };
}

payload!(SuccessData, Success);
payload!(VolumeData, Volume);
payload!(MuteData, Mute);
payload!(ScreenData, Screen);
payload!(TaskData, Task);
payload!(Vec<TaskData>, TaskList);
payload!(Vec<PackageData>, PackageList);
payload!(Vec<UsbDeviceData>, UsbDeviceList);
payload!(OtaHostsData, OtaHosts);

/// Fully decode `raw` as an envelope carrying `T`.
pub fn decode<T: Payload>(raw: &str) -> crate::error::Result<Message> {
    let response: Response<T> = serde_json::from_str(raw).map_err(|e| {
        let type_name = Header::peek(raw).map(|h| h.type_name).unwrap_or_default();
        crate::error::WireError::decode(&type_name, e, raw)
    })?;
    Ok(T::into_message(response))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
