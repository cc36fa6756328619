use std::sync::Arc;

use crate::components::{Component, ComponentContext, Subscriptions, accept};
use crate::error::LinkError;
use crate::event::Property;
use crate::protocol::{Command, TYPE_DUMP_USB, UsbDeviceData};
use crate::sender::CommandSender;

const NAME: &str = "usb";

/// USB devices attached to the board, as of the last dump.
#[derive(Debug)]
pub struct UsbDump {
    sender: CommandSender,
    subs: Subscriptions,
    devices: Arc<Property<Vec<UsbDeviceData>>>,
}

impl UsbDump {
    /// Devices from the last dump.
    pub fn devices(&self) -> &Property<Vec<UsbDeviceData>> {
        &self.devices
    }

    /// Request a USB device dump.
    pub fn dump(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::usb_dump())
    }
}

impl Component for UsbDump {
    fn create(ctx: ComponentContext) -> Self {
        let devices = Arc::new(Property::default());
        let subs = ctx.subscriptions();
        let state = Arc::clone(&devices);
        subs.on::<Vec<UsbDeviceData>>(TYPE_DUMP_USB, move |resp| {
            if let Some(list) = accept(NAME, resp) {
                state.set(list.clone());
            }
        });
        Self { sender: ctx.sender().clone(), subs, devices }
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn dispose(&self) {
        self.subs.clear();
    }
}
