//! Display power.

use std::sync::Arc;

use tracing::warn;

use crate::components::{Component, ComponentContext, Subscriptions, TARGET, report};
use crate::error::LinkError;
use crate::event::{Event, Property};
use crate::protocol::{Command, ErrorInfo, ScreenData, TYPE_SCREEN};
use crate::sender::CommandSender;

const NAME: &str = "screen";

/// Screen power. `on` only changes when the board reports the command as
/// applied; anything else fires `command_failed`.
#[derive(Debug)]
pub struct Screen {
    sender: CommandSender,
    subs: Subscriptions,
    state: Arc<ScreenState>,
}

#[derive(Debug, Default)]
struct ScreenState {
    on: Property<bool>,
    command_failed: Event<ErrorInfo>,
}

impl Screen {
    /// `true` while the display is powered.
    pub fn on(&self) -> &Property<bool> {
        &self.state.on
    }

    /// Fires for board errors and for replies with `success: false`.
    pub fn command_failed(&self) -> &Event<ErrorInfo> {
        &self.state.command_failed
    }

    pub fn power_on(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::screen_power(true))
    }

    pub fn power_off(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::screen_power(false))
    }

    /// Query display power.
    pub fn refresh(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::screen_get())
    }
}

impl Component for Screen {
    fn create(ctx: ComponentContext) -> Self {
        let state = Arc::new(ScreenState::default());
        let subs = ctx.subscriptions();
        let s = Arc::clone(&state);
        subs.on::<ScreenData>(TYPE_SCREEN, move |resp| {
            if let Some(err) = &resp.error {
                report(NAME, resp, err);
                s.command_failed.emit(err);
                return;
            }
            match resp.value {
                Some(ScreenData { success: true, state: on }) => {
                    s.on.set(on);
                }
                _ => {
                    warn!(target: TARGET, component = NAME, "screen command not applied");
                    s.command_failed.emit(&ErrorInfo {
                        code: None,
                        message: Some("screen command not applied".to_owned()),
                    });
                }
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::{context, record};

    #[test]
    fn power_commands() {
        let (wire, ctx) = context();
        let screen = Screen::create(ctx);
        screen.power_on().unwrap();
        screen.power_off().unwrap();
        screen.initialize().unwrap();
        assert_eq!(wire.take(), ["vm screen -on", "vm screen -off", "vm screen -g"]);
    }

    #[test]
    fn unsuccessful_reply_keeps_state_and_reports() {
        let (_wire, ctx) = context();
        let dispatcher = ctx.dispatcher().clone();
        let screen = Screen::create(ctx);
        let failures = record(screen.command_failed());

        dispatcher.handle_incoming(r#"{"type":"ScreenResponse","value":{"success":true,"state":true}}"#);
        assert!(screen.on().get());

        dispatcher.handle_incoming(r#"{"type":"ScreenResponse","value":{"success":false,"state":false}}"#);
        assert!(screen.on().get());

        dispatcher.handle_incoming(r#"{"type":"ScreenResponse","error":{"code":"7","message":"panel fault"}}"#);
        assert!(screen.on().get());

        let failures = failures.lock();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[1].describe(), "panel fault");
    }
}
