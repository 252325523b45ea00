/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A SLIP escape byte was followed by something other than a substitute.
    #[error("invalid SLIP escape: 0x{byte:02X} at offset {offset} after ESC")]
    InvalidEscape { byte: u8, offset: usize },

    /// A SLIP frame ended right after an escape byte.
    #[error("SLIP frame ends inside an escape sequence")]
    TruncatedEscape,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True when only the offending frame is lost and the stream can be read on.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidEscape { .. } | FrameError::TruncatedEscape
        )
    }

    /// True for read/write timeouts configured on the underlying stream.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
