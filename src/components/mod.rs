//! Capability components.
//!
//! Each component owns one slice of board functionality. It registers its
//! response subscriptions when created, sends [`Command`](crate::protocol::Command)s
//! from its action methods, and keeps the board's last reported state in
//! [`Property`](crate::event::Property) values. Actions never wait for the
//! reply; state changes arrive later on the dispatch worker.

pub mod activity;
pub mod keys;
pub mod mute;
pub mod ota;
pub mod packages;
pub mod registry;
pub mod screen;
pub mod session;
pub mod tasks;
pub mod usb;
pub mod volume;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::dispatch::{Dispatcher, SubscriptionId};
use crate::error::LinkError;
use crate::protocol::{Command, ErrorInfo, Payload, Response, SuccessData};
use crate::sender::CommandSender;

pub use activity::Activity;
pub use keys::{KeyCode, Keys};
pub use mute::Mute;
pub use ota::OtaHosts;
pub use packages::Packages;
pub use registry::Registry;
pub use screen::Screen;
pub use session::Session;
pub use tasks::Tasks;
pub use usb::UsbDump;
pub use volume::Volume;

pub(crate) const TARGET: &str = "vmlink::components";

/// A capability bound to one board link.
///
/// Instances are created and cached by the [`Registry`]; at most one exists
/// per type per link.
pub trait Component: Any + Send + Sync {
    /// Build the component and register its subscriptions.
    fn create(ctx: ComponentContext) -> Self
    where
        Self: Sized;

    fn name(&self) -> &'static str;

    /// Prime state from the board. Runs each time the link becomes ready,
    /// and right away for components created while it already is.
    fn initialize(&self) -> Result<(), LinkError> {
        Ok(())
    }

    /// Remove every subscription this component registered.
    fn dispose(&self);
}

/// What a component gets to talk to the board with.
#[derive(Debug, Clone)]
pub struct ComponentContext {
    sender: CommandSender,
    dispatcher: Arc<Dispatcher>,
}

impl ComponentContext {
    pub fn new(sender: CommandSender, dispatcher: Arc<Dispatcher>) -> Self {
        Self { sender, dispatcher }
    }

    pub fn sender(&self) -> &CommandSender {
        &self.sender
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// An empty set of subscriptions on this context's dispatcher.
    pub fn subscriptions(&self) -> Subscriptions {
        Subscriptions { dispatcher: Arc::clone(&self.dispatcher), ids: Mutex::new(Vec::new()) }
    }
}

/// Subscriptions owned by one component, removed together.
pub struct Subscriptions {
    dispatcher: Arc<Dispatcher>,
    ids: Mutex<Vec<SubscriptionId>>,
}

impl Subscriptions {
    /// Subscribe a typed handler and keep its id for [`clear`](Self::clear).
    pub fn on<T: Payload>(
        &self,
        type_name: &str,
        f: impl Fn(&Response<T>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.dispatcher.on::<T>(type_name, f);
        self.ids.lock().push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unsubscribe everything. Returns how many subscriptions were live.
    pub fn clear(&self) -> usize {
        let ids = std::mem::take(&mut *self.ids.lock());
        ids.into_iter().filter(|id| self.dispatcher.unsubscribe(*id)).count()
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriptions").field("count", &self.len()).finish()
    }
}

/// The payload of a successful response. Board-reported errors are logged
/// and yield `None`.
pub(crate) fn accept<'a, T>(component: &'static str, response: &'a Response<T>) -> Option<&'a T> {
    if let Some(err) = &response.error {
        report(component, response, err);
        return None;
    }
    let payload = response.payload();
    if payload.is_none() {
        debug!(target: TARGET, component, type_name = %response.type_name, "response without value");
    }
    payload
}

/// Judge a plain acknowledgement. A board error is logged and returned as is;
/// a reply without `success: true` becomes a synthetic failure.
pub(crate) fn acknowledged(component: &'static str, response: &Response<SuccessData>) -> Result<(), ErrorInfo> {
    if let Some(err) = &response.error {
        report(component, response, err);
        return Err(err.clone());
    }
    if response.value.is_some_and(|ack| ack.success) {
        return Ok(());
    }
    warn!(target: TARGET, component, type_name = %response.type_name, "command not acknowledged");
    Err(ErrorInfo { code: None, message: Some(format!("{} not acknowledged", response.type_name)) })
}

pub(crate) fn report<T>(component: &'static str, response: &Response<T>, err: &ErrorInfo) {
    error!(
        target: TARGET,
        component,
        type_name = %response.type_name,
        code = ?err.code,
        id = ?response.error_id,
        "board error: {}",
        err.describe()
    );
}

/// Send a query triggered by a reply, logging any send error.
pub(crate) fn follow_up(component: &'static str, sender: &CommandSender, command: &Command) {
    if let Err(e) = sender.send(command) {
        warn!(target: TARGET, component, command = %command, error = %e, "follow-up not sent");
    }
}
