use crate::state::ChannelId;

/// Errors that can occur in channel and manager operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sparklink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sparklink_frame::FrameError),

    /// A payload could not be parsed into a perception.
    #[error("malformed message: {0}")]
    Parse(#[from] sparklink_sexpr::ParseError),

    /// Only one input channel may drive the manager status.
    #[error("main channel already registered ({existing})")]
    DuplicateMainChannel { existing: String },

    #[error("channel '{0}' is not connected")]
    NotConnected(String),

    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    /// Spawning a receive or timer thread failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
