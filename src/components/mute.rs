use std::sync::Arc;

use crate::components::{Component, ComponentContext, Subscriptions, accept};
use crate::error::LinkError;
use crate::event::Property;
use crate::protocol::{Command, MuteData, TYPE_MUTE};
use crate::sender::CommandSender;

const NAME: &str = "mute";

/// Audio mute state.
#[derive(Debug)]
pub struct Mute {
    sender: CommandSender,
    subs: Subscriptions,
    muted: Arc<Property<bool>>,
}

impl Mute {
    /// Last mute state the board reported.
    pub fn muted(&self) -> &Property<bool> {
        &self.muted
    }

    /// Request mute on or off. `muted` changes when the board confirms.
    pub fn set(&self, muted: bool) -> Result<(), LinkError> {
        self.sender.send(&Command::mute_set(muted))
    }

    /// Request the opposite of the last reported state.
    pub fn toggle(&self) -> Result<(), LinkError> {
        self.set(!self.muted.get())
    }

    /// Query the mute state.
    pub fn refresh(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::mute_get())
    }
}

impl Component for Mute {
    fn create(ctx: ComponentContext) -> Self {
        let muted = Arc::new(Property::new(false));
        let subs = ctx.subscriptions();
        let state = Arc::clone(&muted);
        subs.on::<MuteData>(TYPE_MUTE, move |resp| {
            if let Some(data) = accept(NAME, resp) {
                state.set(data.is_mute);
            }
        });
        Self { sender: ctx.sender().clone(), subs, muted }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::{context, record};

    #[test]
    fn toggle_follows_reported_state() {
        let (wire, ctx) = context();
        let dispatcher = ctx.dispatcher().clone();
        let mute = Mute::create(ctx);
        let seen = record(mute.muted().changed());

        mute.toggle().unwrap();
        dispatcher.handle_incoming(r#"{"type":"MuteResponse","value":{"isMute":true}}"#);
        mute.toggle().unwrap();

        assert_eq!(wire.take(), ["vm mute -s true", "vm mute -s false"]);
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[test]
    fn initialize_queries() {
        let (wire, ctx) = context();
        Mute::create(ctx).initialize().unwrap();
        assert_eq!(wire.take(), ["vm mute -g"]);
    }
}
