use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

/// Handle assigned to a channel when it is registered with a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Link state of a single channel.
///
/// ```text
/// NotConnected -> TryingToConnect -> Connected <-> Disconnected
///                                 \-> ConnectionFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    NotConnected,
    TryingToConnect,
    Connected,
    Disconnected,
    ConnectionFailed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "not connected",
            ConnectionState::TryingToConnect => "trying to connect",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::ConnectionFailed => "connection failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality of the most recent inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataState {
    #[default]
    NoData,
    CorrectData,
    InvalidData,
}

impl fmt::Display for DataState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataState::NoData => "no data",
            DataState::CorrectData => "correct data",
            DataState::InvalidData => "invalid data",
        })
    }
}

/// Snapshot of a channel's `(connection, data, last error)` triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelState {
    pub connection: ConnectionState,
    pub data: DataState,
    pub last_error: Option<String>,
}

impl ChannelState {
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.connection, self.data)?;
        if let Some(err) = &self.last_error {
            write!(f, " (last error: {err})")?;
        }
        Ok(())
    }
}

/// Shared, lock-protected channel state.
///
/// Owned by one channel; its receive thread and the status readers hold
/// clones.
#[derive(Debug, Clone, Default)]
pub struct StateCell {
    inner: Arc<RwLock<ChannelState>>,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ChannelState {
        self.inner.read().clone()
    }

    pub fn connection(&self) -> ConnectionState {
        self.inner.read().connection
    }

    pub fn set_connection(&self, connection: ConnectionState) {
        self.inner.write().connection = connection;
    }

    pub fn set_data(&self, data: DataState) {
        self.inner.write().data = data;
    }

    /// Record a connection-level failure.
    pub fn fail(&self, connection: ConnectionState, error: impl Into<String>) {
        let mut state = self.inner.write();
        state.connection = connection;
        state.last_error = Some(error.into());
    }

    /// Record a message that could not be decoded.
    pub fn invalid_data(&self, error: impl Into<String>) {
        let mut state = self.inner.write();
        state.data = DataState::InvalidData;
        state.last_error = Some(error.into());
    }

    pub fn set_last_error(&self, error: impl Into<String>) {
        self.inner.write().last_error = Some(error.into());
    }

    /// Move to `Connected` with no data seen yet on the new link.
    pub fn connected(&self) {
        let mut state = self.inner.write();
        state.connection = ConnectionState::Connected;
        state.data = DataState::NoData;
    }
}
