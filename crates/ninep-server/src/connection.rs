//! Server-side connection state machine (C4): handshake, dispatch loop,
//! and orderly shutdown.
//!
//! ```text
//!   INIT ── recv Tversion ──► VERSION_OK ── recv Tattach ──► ATTACHED ──► RUNNING
//!     │                           │                             │             │
//!     └─ any other msg → error ───┘    any other msg → error ───┘   shutdown requested
//!                                                                             │
//!                                                                             ▼
//!                                                                         SHUTDOWN
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ninep_core::message::{Message, Request, Response};
use ninep_core::{EngineConfig, Fid, Frame, Qid, Tag, NOFID, NOTAG};
use ninep_transport::{DecodedFrame, FrameWriter, PacketReader};
use tokio::io::{split, ReadHalf, WriteHalf};
use tokio::sync::Notify;

use crate::error::ServerError;

/// Connection metadata fixed at attach time and handed to every
/// invocation of the receive callback. Immutable for the life of the
/// connection.
#[derive(Debug, Clone)]
pub struct AttachInfo {
    pub root_fid: Fid,
    pub uname: String,
    pub aname: String,
    pub version: String,
    pub msize: u32,
}

pub type ReceiveFuture = Pin<Box<dyn Future<Output = Result<Response, String>> + Send>>;

/// The filesystem backend's entry point: given connection info and a
/// parsed request, produce a response payload or an `ename` describing
/// the failure. May be invoked concurrently for different tags on the
/// same connection — implementations must be prepared for that.
pub type ReceiveCallback = Arc<dyn Fn(Arc<AttachInfo>, Request) -> ReceiveFuture + Send + Sync>;

/// Supplies the root `Qid` on `Tattach`. Defaults to `Qid::dir(0, 0)`
/// when the embedder doesn't provide one.
pub type AttachCallback = Arc<dyn Fn(&str, &str) -> Qid + Send + Sync>;

fn default_attach(_aname: &str, _uname: &str) -> Qid {
    Qid::dir(0, 0)
}

/// A handle to request shutdown of a running connection and await its
/// completion, independent of the `Connection` value itself (which is
/// consumed by [`Connection::run`]).
#[derive(Clone)]
pub struct ConnectionHandle {
    please_shutdown: Arc<AtomicBool>,
    shutdown_signal: Arc<Notify>,
    shutdown_complete: Arc<Notify>,
}

impl ConnectionHandle {
    /// Signal the dispatcher to stop, without waiting for it to
    /// actually finish. `please_shutdown` is the flag the dispatcher
    /// checks at the top of its loop; `shutdown_signal` additionally
    /// wakes it if it is presently blocked awaiting the next frame.
    pub fn request_shutdown(&self) {
        self.please_shutdown.store(true, Ordering::Release);
        self.shutdown_signal.notify_one();
    }

    /// Request shutdown and wait for the dispatcher to observe it and
    /// exit. In-flight callback invocations are not cancelled; their
    /// responses may still be written before the loop exits.
    pub async fn disconnect(&self) {
        self.request_shutdown();
        self.shutdown_complete.notified().await;
    }
}

/// A server-side 9P2000 connection past the handshake, ready to run
/// its dispatch loop.
pub struct Connection<F> {
    reader: PacketReader<ReadHalf<F>>,
    writer: FrameWriter<WriteHalf<F>>,
    info: Arc<AttachInfo>,
    please_shutdown: Arc<AtomicBool>,
    shutdown_signal: Arc<Notify>,
    shutdown_complete: Arc<Notify>,
}

impl<F> Connection<F>
where
    F: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    /// Perform the `Tversion`/`Tattach` handshake over `flow` and
    /// return a connection ready to [`run`](Connection::run).
    pub async fn connect(
        flow: F,
        config: &EngineConfig,
        attach: Option<AttachCallback>,
    ) -> Result<Self, ServerError> {
        let (read_half, write_half) = split(flow);
        let mut reader = PacketReader::new(read_half, config.msize);
        let writer = FrameWriter::new(write_half);

        let (msize, version) = Self::handshake_version(&mut reader, &writer, config).await?;
        let info = Self::handshake_attach(&mut reader, &writer, msize, version, attach).await?;

        tracing::info!(
            msize = info.msize,
            version = %info.version,
            aname = %info.aname,
            "server handshake complete"
        );

        Ok(Connection {
            reader,
            writer,
            info: Arc::new(info),
            please_shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_signal: Arc::new(Notify::new()),
            shutdown_complete: Arc::new(Notify::new()),
        })
    }

    pub fn info(&self) -> Arc<AttachInfo> {
        Arc::clone(&self.info)
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            please_shutdown: Arc::clone(&self.please_shutdown),
            shutdown_signal: Arc::clone(&self.shutdown_signal),
            shutdown_complete: Arc::clone(&self.shutdown_complete),
        }
    }

    async fn handshake_version(
        reader: &mut PacketReader<ReadHalf<F>>,
        writer: &FrameWriter<WriteHalf<F>>,
        config: &EngineConfig,
    ) -> Result<(u32, String), ServerError> {
        let frame = match reader.read().await {
            DecodedFrame::Ok(frame) => frame,
            DecodedFrame::Recoverable { tag, reason } => {
                return Err(ServerError::ProtocolViolation(format!(
                    "tag {tag}: malformed Tversion: {reason}"
                )))
            }
            DecodedFrame::Fatal(e) => return Err(e.into()),
        };

        let tag = frame.tag;
        let (msize, peer_version) = match frame.message {
            Message::Request(Request::Version { msize, version }) => (msize, version),
            other => {
                let type_byte = other.type_byte();
                let ename = format!(
                    "expected Tversion, got message type 0x{type_byte:02x}"
                );
                let _ = writer
                    .write(&Frame::new(tag, Message::Response(Response::Err { ename })))
                    .await;
                return Err(ServerError::UnexpectedHandshakeMessage {
                    expected: "Tversion",
                    got: type_byte,
                });
            }
        };

        if peer_version != config.version {
            tracing::warn!(peer_version = %peer_version, "rejecting unknown protocol version");
            let reply = Frame::new(
                NOTAG,
                Message::Response(Response::Version {
                    msize: config.msize,
                    version: "unknown".to_string(),
                }),
            );
            let _ = writer.write(&reply).await;
            return Err(ServerError::UnknownVersion(peer_version));
        }

        let negotiated = msize.min(config.msize);
        let reply = Frame::new(
            NOTAG,
            Message::Response(Response::Version { msize: negotiated, version: peer_version.clone() }),
        );
        writer.write(&reply).await?;
        tracing::debug!(msize = negotiated, "version negotiated");
        Ok((negotiated, peer_version))
    }

    async fn handshake_attach(
        reader: &mut PacketReader<ReadHalf<F>>,
        writer: &FrameWriter<WriteHalf<F>>,
        msize: u32,
        version: String,
        attach: Option<AttachCallback>,
    ) -> Result<AttachInfo, ServerError> {
        let frame = match reader.read().await {
            DecodedFrame::Ok(frame) => frame,
            DecodedFrame::Recoverable { tag, reason } => {
                let _ = writer
                    .write(&Frame::new(
                        tag,
                        Message::Response(Response::Err { ename: reason.to_string() }),
                    ))
                    .await;
                return Err(ServerError::ProtocolViolation(format!(
                    "tag {tag}: malformed Tattach: {reason}"
                )));
            }
            DecodedFrame::Fatal(e) => return Err(e.into()),
        };

        let tag = frame.tag;
        let (fid, afid, uname, aname) = match frame.message {
            Message::Request(Request::Attach { fid, afid, uname, aname }) => {
                (fid, afid, uname, aname)
            }
            other => {
                let type_byte = other.type_byte();
                let ename = format!(
                    "expected Tattach, got message type 0x{type_byte:02x}"
                );
                let _ = writer
                    .write(&Frame::new(tag, Message::Response(Response::Err { ename })))
                    .await;
                return Err(ServerError::UnexpectedHandshakeMessage {
                    expected: "Tattach",
                    got: type_byte,
                });
            }
        };

        let root_fid = if fid != NOFID { fid } else { afid };
        let attach_fn = attach.unwrap_or_else(|| Arc::new(default_attach));
        let qid = attach_fn(&aname, &uname);

        writer
            .write(&Frame::new(tag, Message::Response(Response::Attach { qid })))
            .await?;

        Ok(AttachInfo { root_fid, uname, aname, version, msize })
    }

    /// Run the dispatch loop until shutdown is requested or a fatal
    /// error occurs. Each request is handled by `receive` concurrently
    /// with further reads; responses are written as they complete, in
    /// whatever order that happens to be.
    pub async fn run(mut self, receive: ReceiveCallback) -> Result<(), ServerError> {
        let mut in_flight = tokio::task::JoinSet::new();
        let result = loop {
            if self.please_shutdown.load(Ordering::Acquire) {
                tracing::info!("shutdown requested, exiting dispatch loop");
                break Ok(());
            }

            tokio::select! {
                biased;

                _ = self.shutdown_signal.notified() => {
                    continue;
                }

                frame = self.reader.read() => {
                    match frame {
                        DecodedFrame::Ok(frame) => {
                            if let Err(e) = self.handle_frame(frame, &receive, &mut in_flight).await {
                                break Err(e);
                            }
                        }
                        DecodedFrame::Recoverable { tag, reason } => {
                            tracing::warn!(tag, %reason, "malformed request body, replying Rerror");
                            let _ = self.writer.write(&Frame::new(
                                tag,
                                Message::Response(Response::Err { ename: reason.to_string() }),
                            )).await;
                        }
                        DecodedFrame::Fatal(e) => {
                            tracing::error!(error = %e, "fatal transport error, shutting down");
                            break Err(e.into());
                        }
                    }
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Ok(Some((tag, response))) = joined {
                        let _ = self.writer.write(&Frame::new(tag, Message::Response(response))).await;
                    }
                }
            }
        };

        // Drain any handlers still in flight; their responses are still
        // written (the writer tolerates failures after the peer is gone)
        // but the loop itself doesn't wait on them beyond this point.
        while let Some(joined) = in_flight.join_next().await {
            if let Ok(Some((tag, response))) = joined {
                let _ = self.writer.write(&Frame::new(tag, Message::Response(response))).await;
            }
        }

        self.shutdown_complete.notify_one();
        result
    }

    async fn handle_frame(
        &mut self,
        frame: Frame,
        receive: &ReceiveCallback,
        in_flight: &mut tokio::task::JoinSet<Option<(Tag, Response)>>,
    ) -> Result<(), ServerError> {
        let tag = frame.tag;
        let type_byte = frame.message.type_byte();
        let request = match frame.message {
            Message::Request(r) => r,
            Message::Response(_) => {
                let ename = format!("unexpected response-type message 0x{type_byte:02x}");
                self.writer
                    .write(&Frame::new(tag, Message::Response(Response::Err { ename })))
                    .await?;
                return Ok(());
            }
        };

        if let Request::Flush { oldtag } = request {
            tracing::debug!(tag, oldtag, "flush acknowledged (no cancellation support)");
            self.writer.write(&Frame::new(tag, Message::Response(Response::Flush))).await?;
            return Ok(());
        }

        let receive = Arc::clone(receive);
        let info = Arc::clone(&self.info);
        in_flight.spawn(async move {
            match receive(info, request).await {
                Ok(response) => Some((tag, response)),
                Err(ename) => Some((tag, Response::Err { ename })),
            }
        });
        Ok(())
    }
}
