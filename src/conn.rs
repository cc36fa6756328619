//! Transport boundary and the TCP transport.
//!
//! A [`Transport`] moves lines; it knows nothing about message contents.
//! Inbound lines and connection-state changes go into a [`LineSink`], which
//! feeds the board link's single dispatch worker in arrival order.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::frame::LineSplitter;

pub(crate) const TARGET: &str = "vmlink::conn";

/// Work items for the dispatch worker, processed strictly in order.
#[derive(Debug)]
pub(crate) enum Inbound {
    Line(String),
    Ready,
    Lost,
    Shutdown,
}

/// Where a transport delivers framed lines and connection transitions.
///
/// Cheap to clone; every clone feeds the same worker.
#[derive(Debug, Clone)]
pub struct LineSink {
    tx: Sender<Inbound>,
}

impl LineSink {
    pub(crate) fn new(tx: Sender<Inbound>) -> Self {
        Self { tx }
    }

    /// Deliver one complete message line. Returns `false` once the board
    /// link has shut down.
    pub fn line(&self, line: impl Into<String>) -> bool {
        self.tx.send(Inbound::Line(line.into())).is_ok()
    }

    /// The transport is connected and ready for commands.
    pub fn ready(&self) -> bool {
        self.tx.send(Inbound::Ready).is_ok()
    }

    /// The transport lost its connection.
    pub fn lost(&self) -> bool {
        self.tx.send(Inbound::Lost).is_ok()
    }
}

/// A persistent line-oriented byte stream to the board.
///
/// Implementations frame inbound data themselves (see
/// [`LineSplitter`]) and push each line into the [`LineSink`] given to
/// [`connect`](Self::connect). `send_line` may be called from any thread;
/// [`CommandSender`](crate::sender::CommandSender) serialises calls.
pub trait Transport: Send + Sync {
    fn connect(&self, sink: LineSink) -> Result<(), LinkError>;
    fn disconnect(&self) -> Result<(), LinkError>;
    fn is_connected(&self) -> bool;
    /// Write one line; the implementation appends its delimiter.
    fn send_line(&self, line: &str) -> Result<(), LinkError>;
}

/// Blocking TCP transport with a background reader thread.
pub struct TcpTransport {
    addr: String,
    delimiter: String,
    connect_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    connected: Arc<AtomicBool>,
}

impl TcpTransport {
    /// A transport for `addr` with default delimiter and timeout. Does not connect.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::from_config(&LinkConfig { addr: addr.into(), ..LinkConfig::default() })
    }

    /// A transport using the address, delimiter and connect timeout of `config`.
    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            addr: config.addr.clone(),
            delimiter: config.delimiter.clone(),
            connect_timeout: config.connect_timeout(),
            stream: Mutex::new(None),
            reader: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn resolve(&self) -> Result<SocketAddr, LinkError> {
        self.addr.to_socket_addrs()?.next().ok_or_else(|| {
            LinkError::Io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} did not resolve", self.addr),
            ))
        })
    }
}

impl Transport for TcpTransport {
    fn connect(&self, sink: LineSink) -> Result<(), LinkError> {
        if self.is_connected() {
            return Ok(());
        }
        let addr = self.resolve()?;
        debug!(target: TARGET, %addr, "connecting");
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        // Short lines in both directions; disable Nagle to avoid latency.
        let _ = stream.set_nodelay(true);
        let read_half = stream.try_clone()?;

        *self.stream.lock() = Some(stream);
        self.connected.store(true, Ordering::Release);
        sink.ready();

        let connected = Arc::clone(&self.connected);
        let splitter = LineSplitter::new(&self.delimiter);
        let handle = thread::Builder::new()
            .name("vmlink-reader".into())
            .spawn(move || read_loop(read_half, splitter, sink, connected))?;
        if let Some(old) = self.reader.lock().replace(handle) {
            let _ = old.join();
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<(), LinkError> {
        self.connected.store(false, Ordering::Release);
        if let Some(stream) = self.stream.lock().take() {
            debug!(target: TARGET, addr = %self.addr, "disconnecting");
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
        }
        let handle = self.reader.lock().take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send_line(&self, line: &str) -> Result<(), LinkError> {
        let mut guard = self.stream.lock();
        let stream = guard.as_mut().ok_or(LinkError::NotConnected)?;
        let mut wire = String::with_capacity(line.len() + self.delimiter.len());
        wire.push_str(line);
        wire.push_str(&self.delimiter);
        stream.write_all(wire.as_bytes())?;
        Ok(())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

fn read_loop(mut stream: TcpStream, mut splitter: LineSplitter, sink: LineSink, connected: Arc<AtomicBool>) {
    let mut buf = [0u8; 4096];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => {
                debug!(target: TARGET, "connection closed by board");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                if connected.load(Ordering::Acquire) {
                    warn!(target: TARGET, error = %e, "read failed");
                }
                break;
            }
        };
        for line in splitter.feed(&buf[..n]) {
            trace!(target: TARGET, line = %line, "<<");
            if !sink.line(line) {
                return;
            }
        }
    }
    splitter.reset();
    connected.store(false, Ordering::Release);
    sink.lost();
}
