//! Update-server configuration.

use std::sync::Arc;

use crate::components::{Component, ComponentContext, Subscriptions, accept, acknowledged, follow_up};
use crate::error::LinkError;
use crate::event::{Event, Property};
use crate::protocol::{
    Command, ErrorInfo, OtaHostsData, SuccessData, TYPE_OTA_HOSTS, TYPE_SET_OTA_HOSTS,
};
use crate::sender::CommandSender;

const NAME: &str = "ota";

/// The update servers the board polls.
///
/// A successful set re-queries the host list rather than assuming the
/// board stored exactly what was sent.
#[derive(Debug)]
pub struct OtaHosts {
    sender: CommandSender,
    subs: Subscriptions,
    state: Arc<OtaState>,
}

#[derive(Debug, Default)]
struct OtaState {
    hosts: Property<Vec<String>>,
    set_failed: Event<ErrorInfo>,
}

impl OtaHosts {
    /// Last host list the board reported.
    pub fn hosts(&self) -> &Property<Vec<String>> {
        &self.state.hosts
    }

    /// Fires when the board rejects or does not acknowledge a set.
    pub fn set_failed(&self) -> &Event<ErrorInfo> {
        &self.state.set_failed
    }

    /// Replace the host list. `hosts` updates from the re-query that follows.
    pub fn set<S: AsRef<str>>(&self, hosts: &[S]) -> Result<(), LinkError> {
        self.sender.send(&Command::ota_set(hosts))
    }

    /// Query the host list.
    pub fn refresh(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::ota_get())
    }
}

impl Component for OtaHosts {
    fn create(ctx: ComponentContext) -> Self {
        let state = Arc::new(OtaState::default());
        let subs = ctx.subscriptions();

        let s = Arc::clone(&state);
        subs.on::<OtaHostsData>(TYPE_OTA_HOSTS, move |resp| {
            if let Some(data) = accept(NAME, resp) {
                s.hosts.set(data.hosts.clone());
            }
        });

        let s = Arc::clone(&state);
        let sender = ctx.sender().clone();
        subs.on::<SuccessData>(TYPE_SET_OTA_HOSTS, move |resp| match acknowledged(NAME, resp) {
            Ok(()) => follow_up(NAME, &sender, &Command::ota_get()),
            Err(err) => s.set_failed.emit(&err),
        });

        Self { sender: ctx.sender().clone(), subs, state }
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn initialize(&self) -> Result<(), LinkError> {
        self.refresh()
    }

    fn dispose(&self) {
        self.subs.clear();
    }
}
