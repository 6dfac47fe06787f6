//! Errors surfaced by the transport layer — underlying I/O failures and
//! the framing violations the buffered reader itself detects.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("underlying transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by peer")]
    Eof,

    #[error("connection closed by peer with {buffered} undecodable bytes still buffered")]
    UnexpectedEof { buffered: usize },

    #[error("frame size {size} exceeds negotiated msize {msize}")]
    FrameTooLarge { size: usize, msize: usize },

    #[error("frame header malformed: {0}")]
    HeaderMalformed(String),
}
