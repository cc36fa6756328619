//! Correlated request/reply on top of the dispatcher.
//!
//! The dispatcher never times anything out: a correlated subscription waits
//! until its reply arrives or someone unsubscribes it. [`request`] sends a
//! command carrying a `resultId` and hands back a [`Pending`] that applies a
//! caller-side deadline and unsubscribes when it expires or is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError, bounded};
use tracing::debug;

use crate::dispatch::{Dispatcher, SubscriptionId, TARGET, handler};
use crate::error::LinkError;
use crate::protocol::{Command, Message};
use crate::sender::CommandSender;

/// Hands out `resultId`s unique for the lifetime of one generator.
#[derive(Debug, Default)]
pub struct ResultIds {
    next: AtomicU64,
}

impl ResultIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next id: `"1"`, `"2"`, ...
    pub fn next_id(&self) -> String {
        (self.next.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

/// Send `command` and wait for the `reply_type` message echoing its
/// `resultId`.
///
/// The correlated subscription is registered before the line is written, so
/// a fast reply cannot be missed. Fails with [`LinkError::Protocol`] if the
/// command carries no `resultId`.
pub fn request(
    sender: &CommandSender,
    dispatcher: &Arc<Dispatcher>,
    command: &Command,
    reply_type: &str,
) -> Result<Pending, LinkError> {
    let result_id = command
        .result_id()
        .ok_or_else(|| LinkError::Protocol(format!("`{}` has no resultId to correlate on", command.encode())))?
        .to_owned();

    let (tx, rx) = bounded(1);
    let id = dispatcher.subscribe_correlated(
        reply_type,
        &result_id,
        handler(move |msg: &Message| {
            let _ = tx.try_send(msg.clone());
        }),
    );
    let pending = Pending {
        dispatcher: Arc::clone(dispatcher),
        id,
        rx,
        type_name: reply_type.to_owned(),
        result_id,
    };
    // On failure `pending` drops here and takes its subscription with it.
    sender.send(command)?;
    Ok(pending)
}

/// An outstanding correlated request.
///
/// Dropping it abandons the request and removes its subscription.
#[derive(Debug)]
pub struct Pending {
    dispatcher: Arc<Dispatcher>,
    id: SubscriptionId,
    rx: Receiver<Message>,
    type_name: String,
    result_id: String,
}

impl Pending {
    pub fn result_id(&self) -> &str {
        &self.result_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Block until the reply arrives or `timeout` elapses.
    pub fn wait(self, timeout: Duration) -> Result<Message, LinkError> {
        let deadline = Instant::now() + timeout;
        match self.rx.recv_deadline(deadline) {
            Ok(msg) => Ok(msg),
            Err(RecvTimeoutError::Timeout) => {
                debug!(
                    target: TARGET,
                    type_name = %self.type_name,
                    result_id = %self.result_id,
                    "correlated request timed out"
                );
                Err(LinkError::Timeout {
                    type_name: self.type_name.clone(),
                    result_id: self.result_id.clone(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Closed),
        }
    }

    /// The reply, if it has already arrived.
    pub fn try_take(&self) -> Result<Option<Message>, LinkError> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Closed),
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        // Already gone if the reply fired the one-shot subscription.
        self.dispatcher.unsubscribe(self.id);
    }
}
