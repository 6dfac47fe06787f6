//! Serialised frame writing.
//!
//! Both the server and client connections share the same requirement:
//! many tasks may want to emit a frame concurrently, but the bytes of
//! any one frame must reach the wire atomically. `FrameWriter` wraps a
//! split-off write half in a `tokio::sync::Mutex` so callers just call
//! [`FrameWriter::write`] and never touch the lock directly.

use std::sync::Arc;

use bytes::BytesMut;
use ninep_core::message::encode_message;
use ninep_core::Frame;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::TransportError;

pub struct FrameWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        FrameWriter { inner: Arc::clone(&self.inner) }
    }
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(write_half: W) -> Self {
        FrameWriter { inner: Arc::new(Mutex::new(write_half)) }
    }

    /// Encode and write one frame. Holds the write lock for the
    /// duration of the underlying `write_all`, so concurrent callers
    /// never interleave bytes from two frames.
    pub async fn write(&self, frame: &Frame) -> Result<(), TransportError> {
        let mut buf = BytesMut::with_capacity(frame.sizeof());
        encode_message(frame, &mut buf)
            .expect("frame built from already-validated Message must re-encode");
        let mut guard = self.inner.lock().await;
        guard.write_all(&buf).await?;
        tracing::debug!(tag = frame.tag, size = buf.len(), "frame written");
        Ok(())
    }

    /// Shut down the underlying write half. Errors are logged and
    /// discarded.
    pub async fn close(&self) {
        let mut guard = self.inner.lock().await;
        if let Err(e) = guard.shutdown().await {
            tracing::debug!(error = %e, "error shutting down writer (ignored)");
        }
    }
}
