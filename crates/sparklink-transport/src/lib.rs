//! Byte-stream transport abstraction.
//!
//! The agent core never opens sockets by itself. It is handed a [`Connector`]
//! that knows how to reach the simulator and produces a connected
//! [`TransportStream`]:
//! - TCP (the simulator server)
//! - Unix domain sockets (local proxies, replay tools)
//!
//! This is the lowest layer of sparklink. Framing and channels build on top of
//! the [`TransportStream`] type provided here.

pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use tcp::{TcpConnector, TcpServer};
pub use traits::{Connector, TransportStream};

#[cfg(unix)]
pub use uds::{UnixConnector, UnixDomainSocket};
