//! Server-level error type.
//!
//! Each layer keeps its own error enum; this one exists so the binary and
//! the server entry points can return a single type while `?` does the
//! lifting.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliprelayError {
    #[error(transparent)]
    Transport(#[from] cliprelay_transport::TransportError),

    #[error(transparent)]
    Protocol(#[from] cliprelay_protocol::ProtocolError),

    #[error(transparent)]
    Session(#[from] cliprelay_session::SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_converts() {
        let err: CliprelayError = cliprelay_session::SessionError::InvalidToken.into();
        assert!(matches!(err, CliprelayError::Session(_)));
        // Transparent: the inner message is the whole message.
        assert_eq!(err.to_string(), "invalid token");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let err: CliprelayError = io.into();
        assert!(matches!(err, CliprelayError::Io(_)));
    }

    #[test]
    fn test_transport_error_converts() {
        let inner = cliprelay_transport::TransportError::ConnectionClosed("gone".into());
        let err: CliprelayError = inner.into();
        assert!(matches!(err, CliprelayError::Transport(_)));
    }
}
