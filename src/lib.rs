pub mod components;
pub mod config;
pub mod conn;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod frame;
pub mod link;
pub mod protocol;
pub mod request;
pub mod sender;

pub use components::{Component, ComponentContext, Registry};
pub use config::{DEFAULT_ADDR, LinkConfig};
pub use conn::{LineSink, TcpTransport, Transport};
pub use dispatch::{Dispatched, Dispatcher, DropReason, Handler, SchemaRegistry, SubscriptionId};
pub use error::{LinkError, WireError};
pub use event::{Event, Property};
pub use frame::LineSplitter;
pub use link::BoardLink;
pub use protocol::{Command, ErrorInfo, Message, Response};
pub use request::Pending;
pub use sender::CommandSender;
