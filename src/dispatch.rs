//! Inbound message routing.
//!
//! [`Dispatcher::handle_incoming`] runs each framed line through four steps:
//!
//! 1. [`Header::peek`] pulls out `type` and `resultId` without a full decode.
//! 2. The [`SchemaRegistry`] maps `type` to a decoder. Unknown types are
//!    dropped.
//! 3. The decoder builds a [`Message`]. Decode failures are logged here and
//!    never reach a subscriber.
//! 4. Fan-out, in registration order: every subscription for `type`, then
//!    every subscription for `(type, resultId)`. Correlated subscriptions
//!    are one-shot.
//!
//! Subscription lists are snapshotted before handlers run, so handlers may
//! subscribe or unsubscribe (including themselves) mid-dispatch. A handler
//! that was unsubscribed after the snapshot is skipped.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::error::{Result, WireError};
use crate::protocol::{
    self, Header, Message, MuteData, OtaHostsData, PackageData, Payload, Response, ScreenData,
    SuccessData, TaskData, UsbDeviceData, VolumeData,
};

pub(crate) const TARGET: &str = "vmlink::dispatch";

/// Subscriber callback. Identity (for idempotent registration) is the `Arc`.
pub type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler(f: impl Fn(&Message) + Send + Sync + 'static) -> Handler {
    Arc::new(f)
}

/// Wrap a closure over `Response<T>` as a [`Handler`]. Messages carrying a
/// different schema are ignored.
pub fn typed<T: Payload>(f: impl Fn(&Response<T>) + Send + Sync + 'static) -> Handler {
    Arc::new(move |msg: &Message| {
        if let Some(resp) = msg.response::<T>() {
            f(resp);
        }
    })
}

// ---------------------------------------------------------------------------
// Schema registry
// ---------------------------------------------------------------------------

type DecodeFn = fn(&str) -> Result<Message>;

/// Static map from discriminant to decoder, owned by one dispatcher.
#[derive(Clone)]
pub struct SchemaRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl SchemaRegistry {
    /// An empty registry; every message is dropped as unknown.
    pub fn empty() -> Self {
        Self { decoders: HashMap::new() }
    }

    /// Every response type the board is known to send.
    pub fn standard() -> Self {
        let mut reg = Self::empty();
        reg.register::<SuccessData>(protocol::TYPE_SUCCESS);
        reg.register::<VolumeData>(protocol::TYPE_VOLUME);
        reg.register::<MuteData>(protocol::TYPE_MUTE);
        reg.register::<ScreenData>(protocol::TYPE_SCREEN);
        reg.register::<SuccessData>(protocol::TYPE_KEY);
        reg.register::<SuccessData>(protocol::TYPE_START_ACTIVITY);
        reg.register::<Vec<TaskData>>(protocol::TYPE_LIST_TASKS);
        reg.register::<TaskData>(protocol::TYPE_FOREGROUND_TASK);
        reg.register::<SuccessData>(protocol::TYPE_SWITCH_TASK);
        reg.register::<SuccessData>(protocol::TYPE_REMOVE_TASK);
        reg.register::<Vec<PackageData>>(protocol::TYPE_LIST_PACKAGES);
        reg.register::<Vec<UsbDeviceData>>(protocol::TYPE_DUMP_USB);
        reg.register::<SuccessData>(protocol::TYPE_END_SESSION);
        reg.register::<OtaHostsData>(protocol::TYPE_OTA_HOSTS);
        reg.register::<SuccessData>(protocol::TYPE_SET_OTA_HOSTS);
        reg
    }

    /// Map `type_name` to payload schema `T`, replacing any earlier mapping.
    pub fn register<T: Payload>(&mut self, type_name: &str) {
        self.decoders.insert(type_name.to_owned(), protocol::decode::<T>);
    }

    /// `true` if `type_name` has a registered schema.
    pub fn contains(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    /// Resolve the schema for `header` and fully decode `raw`.
    pub fn decode(&self, header: &Header, raw: &str) -> Result<Message> {
        let decode = self
            .decoders
            .get(&header.type_name)
            .ok_or_else(|| WireError::UnknownType { type_name: header.type_name.clone() })?;
        decode(raw)
    }

    /// Peek the header of `raw` and decode it.
    pub fn decode_line(&self, raw: &str) -> Result<Message> {
        let header = Header::peek(raw).ok_or_else(|| WireError::missing_type(raw))?;
        self.decode(&header, raw)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SchemaRegistry").field("types", &names).finish()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Handle returned by every `subscribe*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What [`Dispatcher::handle_incoming`] did with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Routed; `handlers` subscribers were invoked.
    Delivered { type_name: String, handlers: usize },
    /// Not routable.
    Dropped(DropReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    NoDiscriminant,
    UnknownType(String),
    DecodeFailed(String),
}

struct Subscription {
    id: SubscriptionId,
    type_name: String,
    result_id: Option<String>,
    handler: Handler,
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct Table {
    next_id: u64,
    /// Registration order.
    entries: Vec<Subscription>,
}

/// A handler picked for one fan-out.
struct Target {
    id: SubscriptionId,
    handler: Handler,
    active: Arc<AtomicBool>,
}

/// Routes decoded board messages to subscribers.
pub struct Dispatcher {
    schemas: SchemaRegistry,
    table: Mutex<Table>,
}

impl Dispatcher {
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self { schemas, table: Mutex::new(Table::default()) }
    }

    /// The schemas this dispatcher decodes with.
    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Subscribe to every message with discriminant `type_name`.
    pub fn subscribe(&self, type_name: &str, handler: Handler) -> SubscriptionId {
        self.insert(type_name, None, handler)
    }

    /// Subscribe to the next message with discriminant `type_name` whose
    /// `resultId` equals `result_id`. The subscription is removed after it
    /// fires once; unsubscribe it to give up waiting.
    pub fn subscribe_correlated(
        &self,
        type_name: &str,
        result_id: &str,
        handler: Handler,
    ) -> SubscriptionId {
        self.insert(type_name, Some(result_id), handler)
    }

    /// Typed form of [`subscribe`](Self::subscribe).
    pub fn on<T: Payload>(
        &self,
        type_name: &str,
        f: impl Fn(&Response<T>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribe(type_name, typed(f))
    }

    /// Typed form of [`subscribe_correlated`](Self::subscribe_correlated).
    pub fn on_correlated<T: Payload>(
        &self,
        type_name: &str,
        result_id: &str,
        f: impl Fn(&Response<T>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.subscribe_correlated(type_name, result_id, typed(f))
    }

    fn insert(&self, type_name: &str, result_id: Option<&str>, handler: Handler) -> SubscriptionId {
        let mut table = self.table.lock();
        let existing = table.entries.iter().find(|s| {
            s.type_name == type_name
                && s.result_id.as_deref() == result_id
                && Arc::ptr_eq(&s.handler, &handler)
        });
        if let Some(existing) = existing {
            trace!(target: TARGET, type_name, "handler already subscribed");
            return existing.id;
        }
        table.next_id += 1;
        let id = SubscriptionId(table.next_id);
        table.entries.push(Subscription {
            id,
            type_name: type_name.to_owned(),
            result_id: result_id.map(str::to_owned),
            handler,
            active: Arc::new(AtomicBool::new(true)),
        });
        id
    }

    /// Remove one subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.table.lock();
        let Some(pos) = table.entries.iter().position(|s| s.id == id) else {
            return false;
        };
        let sub = table.entries.remove(pos);
        sub.active.store(false, Ordering::Release);
        true
    }

    /// Remove every subscription using `handler`. Returns how many were removed.
    pub fn unsubscribe_handler(&self, handler: &Handler) -> usize {
        let mut table = self.table.lock();
        let before = table.entries.len();
        table.entries.retain(|s| {
            let keep = !Arc::ptr_eq(&s.handler, handler);
            if !keep {
                s.active.store(false, Ordering::Release);
            }
            keep
        });
        before - table.entries.len()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route one framed line. Never panics and never returns an error;
    /// anything unroutable is dropped and logged.
    pub fn handle_incoming(&self, raw: &str) -> Dispatched {
        let Some(header) = Header::peek(raw) else {
            trace!(target: TARGET, line = raw, "dropping line without discriminant");
            return Dispatched::Dropped(DropReason::NoDiscriminant);
        };

        let message = match self.schemas.decode(&header, raw) {
            Ok(message) => message,
            Err(WireError::UnknownType { type_name }) => {
                debug!(target: TARGET, type_name = %type_name, "dropping unknown response type");
                return Dispatched::Dropped(DropReason::UnknownType(type_name));
            }
            Err(e) => {
                warn!(target: TARGET, type_name = %header.type_name, error = %e, "dropping undecodable message");
                return Dispatched::Dropped(DropReason::DecodeFailed(header.type_name));
            }
        };

        let targets = self.collect_targets(&header);
        trace!(
            target: TARGET,
            type_name = %header.type_name,
            result_id = ?header.result_id,
            subscribers = targets.len(),
            "dispatching"
        );

        let mut invoked = 0;
        for target in targets {
            if !target.active.load(Ordering::Acquire) {
                continue;
            }
            invoked += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| (target.handler)(&message)));
            if outcome.is_err() {
                error!(
                    target: TARGET,
                    type_name = %header.type_name,
                    subscription = target.id.0,
                    "subscriber panicked; continuing fan-out"
                );
            }
        }

        Dispatched::Delivered { type_name: header.type_name, handlers: invoked }
    }

    /// Snapshot the handlers for `header`: type-keyed first, then correlated.
    /// Correlated matches are removed from the table here (one-shot).
    fn collect_targets(&self, header: &Header) -> Vec<Target> {
        let mut table = self.table.lock();
        let mut targets: Vec<Target> = table
            .entries
            .iter()
            .filter(|s| s.result_id.is_none() && s.type_name == header.type_name)
            .map(Target::from)
            .collect();

        if let Some(result_id) = header.result_id.as_deref() {
            let matches = |s: &Subscription| {
                s.type_name == header.type_name && s.result_id.as_deref() == Some(result_id)
            };
            targets.extend(table.entries.iter().filter(|s| matches(*s)).map(Target::from));
            // The snapshot keeps these targets active until they run.
            table.entries.retain(|s| !matches(s));
        }
        targets
    }
}

impl From<&Subscription> for Target {
    fn from(s: &Subscription) -> Self {
        Self { id: s.id, handler: Arc::clone(&s.handler), active: Arc::clone(&s.active) }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(SchemaRegistry::standard())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("schemas", &self.schemas)
            .field("subscriptions", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const VOLUME_42: &str = r#"{"type":"VolumeResponse","value":{"volume":42}}"#;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let make = move |name: &'static str| {
            let log = Arc::clone(&log2);
            handler(move |_msg| log.lock().push(name.to_string()))
        };
        (log, make)
    }

    #[test]
    fn fan_out_in_registration_order() {
        let d = Dispatcher::default();
        let (log, make) = recorder();
        for name in ["a", "b", "c", "d"] {
            d.subscribe(protocol::TYPE_VOLUME, make(name));
        }
        let out = d.handle_incoming(VOLUME_42);
        assert_eq!(out, Dispatched::Delivered { type_name: "VolumeResponse".into(), handlers: 4 });
        assert_eq!(*log.lock(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn other_types_not_delivered() {
        let d = Dispatcher::default();
        let (log, make) = recorder();
        d.subscribe(protocol::TYPE_MUTE, make("mute"));
        d.handle_incoming(VOLUME_42);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn unknown_type_dropped() {
        let d = Dispatcher::default();
        let (log, make) = recorder();
        d.subscribe("UnknownFutureType", make("never"));
        let out = d.handle_incoming(r#"{"type":"UnknownFutureType","value":{"x":1}}"#);
        assert_eq!(out, Dispatched::Dropped(DropReason::UnknownType("UnknownFutureType".into())));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn missing_discriminant_dropped() {
        let d = Dispatcher::default();
        assert_eq!(
            d.handle_incoming(r#"{"value":{"volume":1}}"#),
            Dispatched::Dropped(DropReason::NoDiscriminant)
        );
        assert_eq!(d.handle_incoming("garbage"), Dispatched::Dropped(DropReason::NoDiscriminant));
    }

    #[test]
    fn decode_failure_reaches_no_subscriber() {
        let d = Dispatcher::default();
        let (log, make) = recorder();
        d.subscribe(protocol::TYPE_VOLUME, make("v"));
        let out = d.handle_incoming(r#"{"type":"VolumeResponse","value":{"volume":"loud"}}"#);
        assert_eq!(out, Dispatched::Dropped(DropReason::DecodeFailed("VolumeResponse".into())));
        let out = d.handle_incoming(r#"{"type":"VolumeResponse","value":{"vol"#);
        assert_eq!(out, Dispatched::Dropped(DropReason::DecodeFailed("VolumeResponse".into())));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn correlated_and_type_level() {
        let d = Dispatcher::default();
        let (log, make) = recorder();
        d.subscribe(protocol::TYPE_SWITCH_TASK, make("type"));
        d.subscribe_correlated(protocol::TYPE_SWITCH_TASK, "abc", make("abc"));

        d.handle_incoming(r#"{"type":"SwitchTaskResponse","resultId":"abc","value":{"success":true}}"#);
        d.handle_incoming(r#"{"type":"SwitchTaskResponse","value":{"success":true}}"#);

        assert_eq!(*log.lock(), vec!["type", "abc", "type"]);
    }

    #[test]
    fn correlation_exclusivity() {
        let d = Dispatcher::default();
        let (log, make) = recorder();
        d.subscribe_correlated(protocol::TYPE_KEY, "id1", make("id1"));
        d.handle_incoming(r#"{"type":"KeyResponse","resultId":"id2","value":{"success":true}}"#);
        d.handle_incoming(r#"{"type":"SuccessResponse","resultId":"id1","value":{"success":true}}"#);
        assert!(log.lock().is_empty());
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn correlated_is_one_shot() {
        let d = Dispatcher::default();
        let (log, make) = recorder();
        d.subscribe_correlated(protocol::TYPE_KEY, "k", make("k"));
        let line = r#"{"type":"KeyResponse","resultId":"k","value":{"success":true}}"#;
        d.handle_incoming(line);
        d.handle_incoming(line);
        assert_eq!(*log.lock(), vec!["k"]);
        assert!(d.is_empty());
    }

    #[test]
    fn duplicate_registration_is_noop() {
        let d = Dispatcher::default();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let h = handler(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let a = d.subscribe(protocol::TYPE_VOLUME, Arc::clone(&h));
        let b = d.subscribe(protocol::TYPE_VOLUME, Arc::clone(&h));
        assert_eq!(a, b);
        assert_eq!(d.len(), 1);
        d.handle_incoming(VOLUME_42);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Same handler under another discriminant is a separate subscription.
        d.subscribe(protocol::TYPE_MUTE, Arc::clone(&h));
        assert_eq!(d.len(), 2);
        assert_eq!(d.unsubscribe_handler(&h), 2);
        assert!(d.is_empty());
    }

    #[test]
    fn unsubscribe() {
        let d = Dispatcher::default();
        let (log, make) = recorder();
        let id = d.subscribe(protocol::TYPE_VOLUME, make("v"));
        assert!(d.unsubscribe(id));
        assert!(!d.unsubscribe(id));
        d.handle_incoming(VOLUME_42);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn panicking_subscriber_does_not_stop_fan_out() {
        let d = Dispatcher::default();
        let (log, make) = recorder();
        d.subscribe(protocol::TYPE_VOLUME, make("before"));
        d.subscribe(protocol::TYPE_VOLUME, handler(|_| panic!("subscriber bug")));
        d.subscribe(protocol::TYPE_VOLUME, make("after"));
        let out = d.handle_incoming(VOLUME_42);
        assert_eq!(out, Dispatched::Delivered { type_name: "VolumeResponse".into(), handlers: 3 });
        assert_eq!(*log.lock(), vec!["before", "after"]);
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn unsubscribe_during_fan_out_skips_later_handler() {
        let d = Arc::new(Dispatcher::default());
        let (log, make) = recorder();
        let victim: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let d2 = Arc::clone(&d);
        let v2 = Arc::clone(&victim);
        d.subscribe(
            protocol::TYPE_VOLUME,
            handler(move |_| {
                if let Some(id) = *v2.lock() {
                    d2.unsubscribe(id);
                }
            }),
        );
        let later = d.subscribe(protocol::TYPE_VOLUME, make("later"));
        d.subscribe(protocol::TYPE_VOLUME, make("last"));
        *victim.lock() = Some(later);

        d.handle_incoming(VOLUME_42);
        assert_eq!(*log.lock(), vec!["last"]);
    }

    #[test]
    fn subscribe_during_fan_out_takes_effect_next_message() {
        let d = Arc::new(Dispatcher::default());
        let (log, make) = recorder();
        let d2 = Arc::clone(&d);
        let late = make("late");
        d.subscribe(
            protocol::TYPE_VOLUME,
            handler(move |_| {
                d2.subscribe(protocol::TYPE_VOLUME, Arc::clone(&late));
            }),
        );
        d.handle_incoming(VOLUME_42);
        assert!(log.lock().is_empty());
        d.handle_incoming(VOLUME_42);
        assert_eq!(*log.lock(), vec!["late"]);
    }

    #[test]
    fn typed_handler_sees_payload() {
        let d = Dispatcher::default();
        let seen = Arc::new(Mutex::new(None));
        let s = Arc::clone(&seen);
        d.on::<VolumeData>(protocol::TYPE_VOLUME, move |resp| {
            *s.lock() = resp.payload().map(|v| v.volume);
        });
        d.handle_incoming(VOLUME_42);
        assert_eq!(*seen.lock(), Some(42));
    }

    #[test]
    fn custom_schema_registration() {
        let mut schemas = SchemaRegistry::empty();
        assert!(!schemas.contains(protocol::TYPE_VOLUME));
        schemas.register::<VolumeData>("LegacyVolume");
        let d = Dispatcher::new(schemas);
        let (log, make) = recorder();
        d.subscribe("LegacyVolume", make("legacy"));
        d.handle_incoming(r#"{"type":"LegacyVolume","value":{"volume":3}}"#);
        assert_eq!(
            d.handle_incoming(VOLUME_42),
            Dispatched::Dropped(DropReason::UnknownType("VolumeResponse".into()))
        );
        assert_eq!(*log.lock(), vec!["legacy"]);
    }

    #[test]
    fn decode_line_reports_why() {
        let schemas = SchemaRegistry::standard();
        assert_eq!(schemas.decode_line(VOLUME_42).unwrap().type_name(), protocol::TYPE_VOLUME);
        assert!(matches!(schemas.decode_line(r#"{"value":1}"#), Err(WireError::MissingType { .. })));
        assert!(matches!(
            schemas.decode_line(r#"{"type":"Nope"}"#),
            Err(WireError::UnknownType { ref type_name }) if type_name == "Nope"
        ));
    }
}
