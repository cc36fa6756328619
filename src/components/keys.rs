//! Hardware key injection.

use std::sync::Arc;

use crate::components::{Component, ComponentContext, Subscriptions, acknowledged};
use crate::error::LinkError;
use crate::event::Event;
use crate::protocol::{Command, ErrorInfo, SuccessData, TYPE_KEY};
use crate::sender::CommandSender;

const NAME: &str = "keys";

/// Android key codes the panel reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Home,
    Back,
    VolumeUp,
    VolumeDown,
    Power,
    Menu,
    Raw(u32),
}

impl KeyCode {
    /// The Android key code sent on the wire.
    pub fn code(self) -> u32 {
        match self {
            Self::Home => 3,
            Self::Back => 4,
            Self::VolumeUp => 24,
            Self::VolumeDown => 25,
            Self::Power => 26,
            Self::Menu => 82,
            Self::Raw(code) => code,
        }
    }
}

impl From<u32> for KeyCode {
    fn from(code: u32) -> Self {
        match code {
            3 => Self::Home,
            4 => Self::Back,
            24 => Self::VolumeUp,
            25 => Self::VolumeDown,
            26 => Self::Power,
            82 => Self::Menu,
            other => Self::Raw(other),
        }
    }
}

#[derive(Debug)]
pub struct Keys {
    sender: CommandSender,
    subs: Subscriptions,
    events: Arc<KeyEvents>,
}

#[derive(Debug, Default)]
struct KeyEvents {
    pressed: Event<()>,
    failed: Event<ErrorInfo>,
}

impl Keys {
    /// Inject one press of `key`.
    pub fn press(&self, key: KeyCode) -> Result<(), LinkError> {
        self.sender.send(&Command::key_press(key.code()))
    }

    /// Fires for each acknowledged press.
    pub fn pressed(&self) -> &Event<()> {
        &self.events.pressed
    }

    /// Fires for each press the board rejected or did not acknowledge.
    pub fn failed(&self) -> &Event<ErrorInfo> {
        &self.events.failed
    }
}

impl Component for Keys {
    fn create(ctx: ComponentContext) -> Self {
        let events = Arc::new(KeyEvents::default());
        let subs = ctx.subscriptions();
        let ev = Arc::clone(&events);
        subs.on::<SuccessData>(TYPE_KEY, move |resp| match acknowledged(NAME, resp) {
            Ok(()) => ev.pressed.emit(&()),
            Err(err) => ev.failed.emit(&err),
        });
        Self { sender: ctx.sender().clone(), subs, events }
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn dispose(&self) {
        self.subs.clear();
    }
}
