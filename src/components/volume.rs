//! Output volume.

use std::sync::Arc;

use crate::components::{Component, ComponentContext, Subscriptions, accept};
use crate::error::LinkError;
use crate::event::Property;
use crate::protocol::audio::MAX_VOLUME;
use crate::protocol::{Command, TYPE_VOLUME, VolumeData};
use crate::sender::CommandSender;

const NAME: &str = "volume";

/// Board output volume, 0 to [`MAX_VOLUME`].
///
/// Tracks every `VolumeResponse`, including unsolicited pushes the board
/// sends after [`watch`](Self::watch).
#[derive(Debug)]
pub struct Volume {
    sender: CommandSender,
    subs: Subscriptions,
    level: Arc<Property<u8>>,
}

impl Volume {
    /// Last level the board reported, `0..=100`.
    pub fn level(&self) -> &Property<u8> {
        &self.level
    }

    /// Request an absolute level. Values above [`MAX_VOLUME`] are clamped.
    pub fn set(&self, level: u8) -> Result<(), LinkError> {
        self.sender.send(&Command::volume_set(level.min(MAX_VOLUME)))
    }

    pub fn step_up(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::volume_step_up())
    }

    pub fn step_down(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::volume_step_down())
    }

    /// Query the current level.
    pub fn refresh(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::volume_get())
    }

    /// Ask the board to push volume changes made on the device itself.
    pub fn watch(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::volume_watch())
    }
}

impl Component for Volume {
    fn create(ctx: ComponentContext) -> Self {
        let level = Arc::new(Property::new(0));
        let subs = ctx.subscriptions();
        let state = Arc::clone(&level);
        subs.on::<VolumeData>(TYPE_VOLUME, move |resp| {
            if let Some(data) = accept(NAME, resp) {
                state.set(data.volume);
            }
        });
        Self { sender: ctx.sender().clone(), subs, level }
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn initialize(&self) -> Result<(), LinkError> {
        self.refresh()?;
        self.watch()
    }

    fn dispose(&self) {
        self.subs.clear();
    }
}
