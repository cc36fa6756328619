//! One board connection and everything bound to it.
//!
//! [`BoardLink`] owns the transport, the dispatcher, the component registry
//! and a single dispatch worker. The transport pushes framed lines and
//! connection transitions into the worker's queue; the worker routes lines,
//! initialises components when the link becomes ready, and is the only
//! thread that runs response handlers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, unbounded};
use tracing::{debug, info, warn};

use crate::components::{Component, ComponentContext, Registry};
use crate::config::LinkConfig;
use crate::conn::{Inbound, LineSink, TARGET, TcpTransport, Transport};
use crate::dispatch::{Dispatcher, SchemaRegistry};
use crate::error::LinkError;
use crate::protocol::{Command, Message};
use crate::request::{self, Pending, ResultIds};
use crate::sender::CommandSender;

pub struct BoardLink {
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    sender: CommandSender,
    registry: Arc<Registry>,
    ready: Arc<AtomicBool>,
    inbound: Sender<Inbound>,
    worker: Option<JoinHandle<()>>,
    result_ids: ResultIds,
    request_timeout: Duration,
}

impl BoardLink {
    /// Link over `transport` using the standard response schemas.
    pub fn new(transport: impl Transport + 'static) -> Result<Self, LinkError> {
        Self::with_schemas(Arc::new(transport), SchemaRegistry::standard())
    }

    /// Link over TCP to `config.addr`. Does not connect yet.
    pub fn tcp(config: &LinkConfig) -> Result<Self, LinkError> {
        let mut link = Self::new(TcpTransport::from_config(config))?;
        link.request_timeout = config.request_timeout();
        Ok(link)
    }

    /// Link over `transport`, decoding with a custom schema set.
    pub fn with_schemas(transport: Arc<dyn Transport>, schemas: SchemaRegistry) -> Result<Self, LinkError> {
        let dispatcher = Arc::new(Dispatcher::new(schemas));
        let sender = CommandSender::new(Arc::clone(&transport));
        let ready = Arc::new(AtomicBool::new(false));
        let registry = Arc::new(Registry::new(
            ComponentContext::new(sender.clone(), Arc::clone(&dispatcher)),
            Arc::clone(&ready),
        ));

        let (tx, rx) = unbounded();
        let worker = {
            let dispatcher = Arc::clone(&dispatcher);
            let registry = Arc::clone(&registry);
            let ready = Arc::clone(&ready);
            thread::Builder::new()
                .name("vmlink-dispatch".into())
                .spawn(move || run_worker(rx, &dispatcher, &registry, &ready))?
        };

        Ok(Self {
            transport,
            dispatcher,
            sender,
            registry,
            ready,
            inbound: tx,
            worker: Some(worker),
            result_ids: ResultIds::new(),
            request_timeout: LinkConfig::default().request_timeout(),
        })
    }

    /// Open the transport. Components initialise on the worker once the
    /// transport reports ready.
    pub fn connect(&self) -> Result<(), LinkError> {
        self.transport.connect(self.sink())
    }

    pub fn disconnect(&self) -> Result<(), LinkError> {
        self.transport.disconnect()
    }

    /// `true` between the transport's ready and lost notifications.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// A sink feeding this link's worker, for driving a custom transport.
    pub fn sink(&self) -> LineSink {
        LineSink::new(self.inbound.clone())
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn sender(&self) -> &CommandSender {
        &self.sender
    }

    /// Fire-and-forget send. Fails with [`LinkError::NotConnected`] while the transport is down.
    pub fn send(&self, command: &Command) -> Result<(), LinkError> {
        self.sender.send(command)
    }

    /// The link's `T`, created on first use.
    pub fn component<T: Component>(&self) -> Arc<T> {
        self.registry.get::<T>()
    }

    /// Every component created so far, in creation order.
    pub fn components(&self) -> Vec<Arc<dyn Component>> {
        self.registry.all()
    }

    /// Send `command` with a fresh `resultId` and return the pending reply
    /// of type `reply_type`.
    pub fn request(&self, command: Command, reply_type: &str) -> Result<Pending, LinkError> {
        let command = command.with_result_id(self.result_ids.next_id());
        request::request(&self.sender, &self.dispatcher, &command, reply_type)
    }

    /// [`request`](Self::request) and wait up to the configured request
    /// timeout for the reply.
    pub fn call(&self, command: Command, reply_type: &str) -> Result<Message, LinkError> {
        self.request(command, reply_type)?.wait(self.request_timeout)
    }

    /// How long [`call`](Self::call) waits for a reply.
    pub fn set_request_timeout(&mut self, timeout: Duration) {
        self.request_timeout = timeout;
    }

    /// Dispose components, stop the worker and close the transport.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.registry.dispose();
        let _ = self.inbound.send(Inbound::Shutdown);
        if worker.join().is_err() {
            warn!(target: TARGET, "dispatch worker panicked");
        }
        if let Err(e) = self.transport.disconnect() {
            debug!(target: TARGET, error = %e, "disconnect on shutdown failed");
        }
        self.ready.store(false, Ordering::Release);
    }
}

impl Drop for BoardLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for BoardLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardLink")
            .field("ready", &self.is_ready())
            .field("dispatcher", &self.dispatcher)
            .field("registry", &self.registry)
            .finish()
    }
}

fn run_worker(rx: Receiver<Inbound>, dispatcher: &Dispatcher, registry: &Registry, ready: &AtomicBool) {
    for event in rx {
        match event {
            Inbound::Line(line) => {
                dispatcher.handle_incoming(&line);
            }
            Inbound::Ready => {
                info!(target: TARGET, "link ready");
                ready.store(true, Ordering::Release);
                registry.initialize_all();
            }
            Inbound::Lost => {
                if ready.swap(false, Ordering::AcqRel) {
                    info!(target: TARGET, "link lost");
                }
            }
            Inbound::Shutdown => break,
        }
    }
    debug!(target: TARGET, "dispatch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::components::Volume;
    use crate::protocol::{SuccessData, TYPE_KEY};

    /// Connects instantly; `sink` lets the test play the board.
    #[derive(Default)]
    struct Script {
        sink: Mutex<Option<LineSink>>,
        lines: Mutex<Vec<String>>,
        up: AtomicBool,
    }

    impl Transport for Arc<Script> {
        fn connect(&self, sink: LineSink) -> Result<(), LinkError> {
            self.up.store(true, Ordering::Release);
            sink.ready();
            *self.sink.lock() = Some(sink);
            Ok(())
        }
        fn disconnect(&self) -> Result<(), LinkError> {
            self.up.store(false, Ordering::Release);
            if let Some(sink) = self.sink.lock().take() {
                sink.lost();
            }
            Ok(())
        }
        fn is_connected(&self) -> bool {
            self.up.load(Ordering::Acquire)
        }
        fn send_line(&self, line: &str) -> Result<(), LinkError> {
            self.lines.lock().push(line.to_owned());
            // Echo key presses back as acknowledgements.
            if let Some(rest) = line.strip_prefix("vm key -p 3 resultId=")
                && let Some(sink) = self.sink.lock().as_ref()
            {
                sink.line(format!(r#"{{"type":"KeyResponse","resultId":{rest},"value":{{"success":true}}}}"#));
            }
            Ok(())
        }
    }

    fn wait_until(mut f: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !f() {
            assert!(std::time::Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn ready_initializes_existing_components() {
        let script = Arc::new(Script::default());
        let link = BoardLink::new(Arc::clone(&script)).unwrap();
        let volume = link.component::<Volume>();
        assert!(script.lines.lock().is_empty());

        link.connect().unwrap();
        wait_until(|| script.lines.lock().len() == 2);
        assert_eq!(*script.lines.lock(), ["vm volume -g", "vm volume -w"]);
        assert!(link.is_ready());

        script.sink.lock().as_ref().unwrap().line(r#"{"type":"VolumeResponse","value":{"volume":33}}"#);
        wait_until(|| volume.level().get() == 33);

        link.disconnect().unwrap();
        wait_until(|| !link.is_ready());
    }

    #[test]
    fn request_round_trip() {
        let script = Arc::new(Script::default());
        let link = BoardLink::new(Arc::clone(&script)).unwrap();
        link.connect().unwrap();

        let msg = link.call(Command::key_press(3), TYPE_KEY).unwrap();
        assert_eq!(msg.result_id(), Some("1"));
        assert!(msg.response::<SuccessData>().unwrap().payload().unwrap().success);
        assert_eq!(*script.lines.lock(), [r#"vm key -p 3 resultId="1""#]);
    }

    #[test]
    fn shutdown_disposes_and_disconnects() {
        let script = Arc::new(Script::default());
        let mut link = BoardLink::new(Arc::clone(&script)).unwrap();
        link.connect().unwrap();
        link.component::<Volume>();
        assert_eq!(link.dispatcher().len(), 1);

        link.shutdown();
        assert!(link.dispatcher().is_empty());
        assert!(!script.is_connected());
        assert!(link.components().is_empty());
        // Second shutdown (and the one in Drop) is a no-op.
        link.shutdown();
    }
}
