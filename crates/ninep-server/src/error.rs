//! Server-side connection errors.

use ninep_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("expected {expected} during handshake, got message type 0x{got:02x}")]
    UnexpectedHandshakeMessage { expected: &'static str, got: u8 },

    #[error("peer requested unknown version {0:?}")]
    UnknownVersion(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}
