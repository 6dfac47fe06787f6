//! Client-side connection and protocol errors.

use ninep_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("tag space exhausted: all 65535 tags have an outstanding transaction")]
    Busy,

    #[error("server returned Rerror: {0}")]
    Remote(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("expected {expected} during handshake, got message type 0x{got:02x}")]
    UnexpectedHandshakeMessage { expected: &'static str, got: u8 },

    #[error("server rejected protocol version, replied {0:?}")]
    UnknownVersion(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}
