use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Connector, TransportStream};

/// Connects to a TCP endpoint such as the simulator server.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Option<Duration>,
    nodelay: bool,
}

impl TcpConnector {
    /// Create a connector for `host:port`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: None,
            nodelay: true,
        }
    }

    /// Bound each connection attempt.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Toggle `TCP_NODELAY` (enabled by default; cycle messages are small).
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Target address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn connect_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Connect {
            target: self.addr.clone(),
            source,
        }
    }

    fn open(&self) -> Result<TcpStream> {
        let Some(timeout) = self.connect_timeout else {
            return TcpStream::connect(&self.addr).map_err(|e| self.connect_error(e));
        };

        let addrs: Vec<SocketAddr> = self
            .addr
            .to_socket_addrs()
            .map_err(|e| self.connect_error(e))?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(match last_err {
            Some(err) => self.connect_error(err),
            None => TransportError::Unresolved {
                target: self.addr.clone(),
            },
        })
    }
}

impl Connector for TcpConnector {
    fn connect(&self) -> Result<TransportStream> {
        let stream = self.open()?;
        stream.set_nodelay(self.nodelay)?;
        debug!(addr = %self.addr, "connected to tcp endpoint");
        Ok(stream.into())
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

/// A listening TCP socket.
///
/// Agents are clients, so this is used by the `listen` command and by tests
/// that stand in for the simulator.
pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Bind and listen on `addr` (use port 0 for an ephemeral port).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            target: addr.to_string(),
            source: e,
        })?;
        let local = listener.local_addr()?;
        info!(addr = %local, "listening on tcp socket");
        Ok(Self { listener })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<TransportStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted connection");
        Ok(stream.into())
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }

    /// A connector pointing at this server.
    pub fn connector(&self) -> Result<TcpConnector> {
        Ok(TcpConnector::new(self.local_addr()?.to_string()))
    }
}
