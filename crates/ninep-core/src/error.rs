//! Wire-level error types for the 9P2000 codec.
//!
//! These are returned by the primitive and message encoders/decoders in
//! this crate. They are deliberately narrow — higher layers (the server
//! and client connections in the sibling crates) wrap them in their own
//! error enums rather than exposing codec internals to callers that only
//! care about connection-level failures.

use thiserror::Error;

/// Errors that can arise while encoding a value to its wire representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("string length {0} exceeds u16::MAX")]
    StringTooLong(usize),

    #[error("stat record body length {0} exceeds u16::MAX")]
    StatTooLong(usize),

    #[error("walk element count {0} exceeds u16::MAX")]
    TooManyWalkElements(usize),

    #[error("message size {0} exceeds u32::MAX")]
    MessageTooLarge(usize),

    #[error("data payload length {0} exceeds u32::MAX")]
    PayloadTooLarge(usize),
}

/// Errors that can arise while decoding a value from its wire representation.
///
/// `ShortBuffer` is never fatal — it means the caller hasn't read enough
/// bytes yet. `Malformed` and `UnknownType` mean the bytes present don't
/// form a valid value; whether that's recoverable depends on whether a
/// tag could still be recovered from an intact frame header (see
/// [`DecodeError::is_recoverable`] and, at the frame level,
/// [`crate::message::FrameDecodeError`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer too short: need at least {needed} bytes, have {have}")]
    ShortBuffer { needed: usize, have: usize },

    #[error("malformed {0}: {1}")]
    Malformed(&'static str, String),

    #[error("unknown message type: 0x{0:02x}")]
    UnknownType(u8),
}

impl DecodeError {
    pub fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::Malformed(what, reason.into())
    }

    /// Recoverable at the tag level: the frame header was intact (we
    /// know the tag), only the body failed to parse.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::Malformed(..) | DecodeError::UnknownType(_))
    }
}
