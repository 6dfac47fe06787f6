//! Buffered, length-prefixed packet reader (C3).
//!
//! Reads from an arbitrary async byte source until a complete 9P2000
//! frame is available, then hands back exactly one [`DecodedFrame`] and
//! retains any leftover bytes for the next call. Never returns a
//! partial frame.
//!
//! Built from whatever read half `tokio::io::split` hands back; it
//! needs nothing more than `AsyncRead`.

use bytes::{Buf, BytesMut};
use ninep_core::message::{decode_message, FrameDecodeError};
use ninep_core::{DecodeError, Frame, Tag};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::TransportError;

/// Initial capacity for the internal buffer. Most 9P frames are far
/// smaller than `msize`; growing from a modest start avoids a large
/// up-front allocation per connection.
const INITIAL_CAPACITY: usize = 4096;

/// Bytes read from the flow per underlying `read` call.
const READ_CHUNK: usize = 8192;

/// Outcome of reading one frame slot off the wire, distinguishing the
/// three cases a dispatcher must act on differently.
pub enum DecodedFrame {
    /// A complete, well-formed frame.
    Ok(Frame),
    /// The frame header was intact (the tag is trustworthy) but the
    /// body failed to parse. The dispatcher should reply `Rerror` at
    /// `tag` and keep reading.
    Recoverable { tag: Tag, reason: DecodeError },
    /// The header itself could not be trusted, or the underlying
    /// transport failed. The connection must be torn down.
    Fatal(TransportError),
}

pub struct PacketReader<F> {
    flow: F,
    msize: u32,
    buf: BytesMut,
}

impl<F: AsyncRead + Unpin + Send> PacketReader<F> {
    pub fn new(flow: F, msize: u32) -> Self {
        PacketReader { flow, msize, buf: BytesMut::with_capacity(INITIAL_CAPACITY) }
    }

    pub fn into_flow(self) -> F {
        self.flow
    }

    pub fn flow_mut(&mut self) -> &mut F {
        &mut self.flow
    }

    /// Read exactly one complete frame slot, growing the internal
    /// buffer and pulling from the underlying flow as needed.
    pub async fn read(&mut self) -> DecodedFrame {
        loop {
            match decode_message(&self.buf) {
                Ok((frame, consumed)) => {
                    self.buf.advance(consumed);
                    tracing::debug!(tag = frame.tag, size = consumed, "frame read");
                    return DecodedFrame::Ok(frame);
                }
                Err(FrameDecodeError::ShortBuffer { needed, .. }) => {
                    if needed > self.msize as usize {
                        return DecodedFrame::Fatal(TransportError::FrameTooLarge {
                            size: needed,
                            msize: self.msize as usize,
                        });
                    }
                    if let Err(e) = self.fill_at_least(needed).await {
                        return DecodedFrame::Fatal(e);
                    }
                }
                Err(FrameDecodeError::HeaderMalformed(reason)) => {
                    tracing::error!(reason = %reason, "unrecoverable frame header");
                    return DecodedFrame::Fatal(TransportError::HeaderMalformed(reason));
                }
                Err(FrameDecodeError::BodyMalformed { tag, consumed, reason }) => {
                    tracing::warn!(tag, %reason, "malformed frame body, recoverable");
                    self.buf.advance(consumed);
                    return DecodedFrame::Recoverable { tag, reason };
                }
            }
        }
    }

    /// Pull bytes from the flow until at least `target` bytes are
    /// buffered, or the peer closes the stream.
    async fn fill_at_least(&mut self, target: usize) -> Result<(), TransportError> {
        while self.buf.len() < target {
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.flow.read(&mut chunk).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Err(TransportError::Eof);
                }
                return Err(TransportError::UnexpectedEof { buffered: self.buf.len() });
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }
}
