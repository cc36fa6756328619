use std::sync::Arc;

use crate::components::{Component, ComponentContext, Subscriptions, acknowledged};
use crate::error::LinkError;
use crate::event::Event;
use crate::protocol::{Command, ErrorInfo, SuccessData, TYPE_END_SESSION};
use crate::sender::CommandSender;

const NAME: &str = "session";

/// Ends the current user session on the panel.
#[derive(Debug)]
pub struct Session {
    sender: CommandSender,
    subs: Subscriptions,
    events: Arc<SessionEvents>,
}

#[derive(Debug, Default)]
struct SessionEvents {
    ended: Event<()>,
    end_failed: Event<ErrorInfo>,
}

impl Session {
    /// Ask the board to end the session.
    pub fn end(&self) -> Result<(), LinkError> {
        self.sender.send(&Command::session_end())
    }

    /// Fires once the board acknowledges the end.
    pub fn ended(&self) -> &Event<()> {
        &self.events.ended
    }

    pub fn end_failed(&self) -> &Event<ErrorInfo> {
        &self.events.end_failed
    }
}

impl Component for Session {
    fn create(ctx: ComponentContext) -> Self {
        let events = Arc::new(SessionEvents::default());
        let subs = ctx.subscriptions();
        let ev = Arc::clone(&events);
        subs.on::<SuccessData>(TYPE_END_SESSION, move |resp| match acknowledged(NAME, resp) {
            Ok(()) => ev.ended.emit(&()),
            Err(err) => ev.end_failed.emit(&err),
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
