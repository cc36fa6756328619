//! Outbound command path.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::conn::{TARGET, Transport};
use crate::error::LinkError;
use crate::protocol::Command;

/// Encodes [`Command`]s and writes them to the transport.
///
/// Clones share one write lock, so lines from different threads never
/// interleave. Sending never waits for a reply.
#[derive(Clone)]
pub struct CommandSender {
    transport: Arc<dyn Transport>,
    write: Arc<Mutex<()>>,
}

impl CommandSender {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, write: Arc::new(Mutex::new(())) }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Write one command line. Concurrent sends never interleave.
    pub fn send(&self, command: &Command) -> Result<(), LinkError> {
        if !self.transport.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let line = command.encode();
        let _guard = self.write.lock();
        debug!(target: TARGET, line = %line, ">>");
        self.transport.send_line(&line)
    }
}

impl fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSender")
            .field("connected", &self.transport.is_connected())
            .finish()
    }
}
