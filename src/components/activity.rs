//! Activity launcher.

use std::sync::Arc;

use tracing::info;

use crate::components::{Component, ComponentContext, Subscriptions, TARGET, acknowledged};
use crate::error::LinkError;
use crate::event::Event;
use crate::protocol::{Command, ErrorInfo, SuccessData, TYPE_START_ACTIVITY};
use crate::sender::CommandSender;

const NAME: &str = "activity";

/// Error code the board reports when the activity is already running.
pub const ALREADY_RUNNING_CODE: &str = "2";

/// Starts activities on the panel.
///
/// The board answers "already running" with an error; that case counts as a
/// launch, since the activity ends up in the foreground either way.
#[derive(Debug)]
pub struct Activity {
    sender: CommandSender,
    subs: Subscriptions,
    events: Arc<LaunchEvents>,
}

#[derive(Debug, Default)]
struct LaunchEvents {
    launched: Event<()>,
    launch_failed: Event<ErrorInfo>,
}

impl Activity {
    /// Send `vm start <package>/<activity>`.
    pub fn start(&self, package: &str, activity: &str) -> Result<(), LinkError> {
        self.sender.send(&Command::start_activity(package, activity))
    }

    /// Fires on success, including "already running".
    pub fn launched(&self) -> &Event<()> {
        &self.events.launched
    }

    /// Fires with the board error, or a synthetic one for an unacknowledged start.
    pub fn launch_failed(&self) -> &Event<ErrorInfo> {
        &self.events.launch_failed
    }
}

/// `true` for the "activity already running" error: code `2`, or a message
/// ending in exactly `result: 2` when the board omits the code.
pub fn is_already_running(err: &ErrorInfo) -> bool {
    match err.code.as_deref() {
        Some(code) => code == ALREADY_RUNNING_CODE,
        None => err
            .message
            .as_deref()
            .and_then(|m| m.rsplit_once("result: "))
            .is_some_and(|(_, result)| result.trim() == ALREADY_RUNNING_CODE),
    }
}

impl Component for Activity {
    fn create(ctx: ComponentContext) -> Self {
        let events = Arc::new(LaunchEvents::default());
        let subs = ctx.subscriptions();
        let ev = Arc::clone(&events);
        subs.on::<SuccessData>(TYPE_START_ACTIVITY, move |resp| {
            if let Some(err) = &resp.error
                && is_already_running(err)
            {
                info!(target: TARGET, component = NAME, "activity already running");
                ev.launched.emit(&());
                return;
            }
            match acknowledged(NAME, resp) {
                Ok(()) => ev.launched.emit(&()),
                Err(err) => ev.launch_failed.emit(&err),
            }
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
