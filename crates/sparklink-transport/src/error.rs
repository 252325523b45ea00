use std::path::PathBuf;

/// Why a connector, listener or stream operation failed.
///
/// Every variant except [`Unresolved`](TransportError::Unresolved) and
/// [`PathTooLong`](TransportError::PathTooLong) carries the OS error, see
/// [`TransportError::io_source`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot listen on {target}: {source}")]
    Bind {
        target: String,
        source: std::io::Error,
    },

    /// The peer could not be reached. Channels report this as `ConnectionFailed`.
    #[error("cannot reach {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// A host name resolved to no socket address.
    #[error("{target} resolves to no address")]
    Unresolved { target: String },

    #[error("accept failed: {0}")]
    Accept(std::io::Error),

    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),

    /// Unix socket paths are limited by `sockaddr_un`.
    #[error("socket path {path} is {len} bytes, limit is {max}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl TransportError {
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                Some(source)
            }
            TransportError::Accept(source) | TransportError::Io(source) => Some(source),
            TransportError::Unresolved { .. } | TransportError::PathTooLong { .. } => None,
        }
    }

    /// True when retrying later may succeed (refused, reset, timed out).
    pub fn is_transient(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            TransportError::Connect { source, .. } | TransportError::Io(source) => matches!(
                source.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::TimedOut
                    | ErrorKind::NotFound
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn refused_connect_is_transient() {
        let err = TransportError::Connect {
            target: "127.0.0.1:3100".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(err.is_transient());
        assert_eq!(err.to_string(), format!("cannot reach 127.0.0.1:3100: {}", err.io_source().unwrap()));
    }

    #[test]
    fn unresolved_has_no_io_source() {
        let err = TransportError::Unresolved {
            target: "nowhere:1".into(),
        };
        assert!(err.io_source().is_none());
        assert!(!err.is_transient());
    }
}
