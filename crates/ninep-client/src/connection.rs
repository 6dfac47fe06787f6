//! Client-side connection state machine (C5): handshake, the pending
//! transaction table, and tag/fid allocation.
//!
//! State machine: `INIT → VERSION_OK → ATTACHED → RUNNING → CLOSED`,
//! mirroring the server. By the time [`ClientConnection::connect`]
//! returns, the connection is already in RUNNING — the handshake
//! itself has no externally observable intermediate states worth
//! modelling as a type.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use ninep_core::message::{Message, Request, Response};
use ninep_core::{EngineConfig, Fid, Frame, Qid, Tag, NOFID, NOTAG};
use ninep_transport::{DecodedFrame, FrameWriter, PacketReader};
use tokio::io::{split, ReadHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::fid_allocator::FidAllocator;
use crate::tag_allocator::TagAllocator;

type PendingSlot = oneshot::Sender<Result<Response, ClientError>>;

struct Shared {
    writer: FrameWriter<Box<dyn tokio::io::AsyncWrite + Unpin + Send>>,
    pending: DashMap<Tag, PendingSlot>,
    tag_allocator: tokio::sync::Mutex<TagAllocator>,
    fid_allocator: FidAllocator,
    closed: AtomicBool,
}

/// A single outstanding request, split from its eventual response so a
/// caller can learn the allocated tag before awaiting completion — the
/// prerequisite for [`ClientConnection::cancel`].
pub struct Call {
    tag: Tag,
    rx: oneshot::Receiver<Result<Response, ClientError>>,
}

impl Call {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub async fn await_response(self) -> Result<Response, ClientError> {
        match self.rx.await {
            Ok(Ok(Response::Err { ename })) => Err(ClientError::Remote(ename)),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }
}

pub struct ClientConnection {
    shared: Arc<Shared>,
    read_task: JoinHandle<()>,
    pub root_fid: Fid,
    pub root_qid: Qid,
    pub msize: u32,
}

impl ClientConnection {
    /// Perform the `Tversion`/`Tattach` handshake over `flow` and spawn
    /// the background read loop that routes responses back to
    /// outstanding [`Call`]s by tag.
    pub async fn connect<F>(
        flow: F,
        config: &EngineConfig,
        uname: impl Into<String>,
        aname: impl Into<String>,
    ) -> Result<Self, ClientError>
    where
        F: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, write_half) = split(flow);
        let mut reader = PacketReader::new(read_half, config.msize);
        let boxed_write: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = Box::new(write_half);
        let writer = FrameWriter::new(boxed_write);

        let msize = Self::handshake_version(&mut reader, &writer, config).await?;

        let uname = uname.into();
        let aname = aname.into();
        let root_fid: Fid = 0;
        let (root_qid,) =
            Self::handshake_attach(&mut reader, &writer, root_fid, &uname, &aname).await?;

        let shared = Arc::new(Shared {
            writer,
            pending: DashMap::new(),
            tag_allocator: tokio::sync::Mutex::new(TagAllocator::new()),
            fid_allocator: FidAllocator::new(root_fid),
            closed: AtomicBool::new(false),
        });

        let read_task = {
            let shared = Arc::clone(&shared);
            tokio::spawn(Self::read_loop(reader, shared))
        };

        tracing::info!(msize, root_fid, "client handshake complete");

        Ok(ClientConnection { shared, read_task, root_fid, root_qid, msize })
    }

    async fn handshake_version<F>(
        reader: &mut PacketReader<ReadHalf<F>>,
        writer: &FrameWriter<Box<dyn tokio::io::AsyncWrite + Unpin + Send>>,
        config: &EngineConfig,
    ) -> Result<u32, ClientError>
    where
        F: tokio::io::AsyncRead + Unpin + Send,
    {
        writer
            .write(&Frame::new(
                NOTAG,
                Message::Request(Request::Version {
                    msize: config.msize,
                    version: config.version.clone(),
                }),
            ))
            .await?;

        let frame = match reader.read().await {
            DecodedFrame::Ok(frame) => frame,
            DecodedFrame::Recoverable { reason, .. } => {
                return Err(ClientError::ProtocolViolation(format!(
                    "malformed Rversion: {reason}"
                )))
            }
            DecodedFrame::Fatal(e) => return Err(e.into()),
        };

        match frame.message {
            Message::Response(Response::Version { msize, version }) if version == config.version => {
                Ok(msize.min(config.msize))
            }
            Message::Response(Response::Version { version, .. }) => {
                Err(ClientError::UnknownVersion(version))
            }
            other => Err(ClientError::UnexpectedHandshakeMessage {
                expected: "Rversion",
                got: other.type_byte(),
            }),
        }
    }

    async fn handshake_attach<F>(
        reader: &mut PacketReader<ReadHalf<F>>,
        writer: &FrameWriter<Box<dyn tokio::io::AsyncWrite + Unpin + Send>>,
        root_fid: Fid,
        uname: &str,
        aname: &str,
    ) -> Result<(Qid,), ClientError>
    where
        F: tokio::io::AsyncRead + Unpin + Send,
    {
        let tag: Tag = 0;
        writer
            .write(&Frame::new(
                tag,
                Message::Request(Request::Attach {
                    fid: root_fid,
                    afid: NOFID,
                    uname: uname.to_string(),
                    aname: aname.to_string(),
                }),
            ))
            .await?;

        let frame = match reader.read().await {
            DecodedFrame::Ok(frame) => frame,
            DecodedFrame::Recoverable { reason, .. } => {
                return Err(ClientError::ProtocolViolation(format!(
                    "malformed Rattach: {reason}"
                )))
            }
            DecodedFrame::Fatal(e) => return Err(e.into()),
        };

        match frame.message {
            Message::Response(Response::Attach { qid }) => Ok((qid,)),
            Message::Response(Response::Err { ename }) => Err(ClientError::Remote(ename)),
            other => Err(ClientError::UnexpectedHandshakeMessage {
                expected: "Rattach",
                got: other.type_byte(),
            }),
        }
    }

    async fn read_loop<F>(mut reader: PacketReader<ReadHalf<F>>, shared: Arc<Shared>)
    where
        F: tokio::io::AsyncRead + Unpin + Send,
    {
        loop {
            match reader.read().await {
                DecodedFrame::Ok(frame) => {
                    let Message::Response(response) = frame.message else {
                        tracing::warn!(tag = frame.tag, "server sent a request, dropping");
                        continue;
                    };
                    match shared.pending.remove(&frame.tag) {
                        Some((_, tx)) => {
                            let _ = tx.send(Ok(response));
                        }
                        None => {
                            tracing::warn!(tag = frame.tag, "response for unknown tag, dropping");
                        }
                    }
                }
                DecodedFrame::Recoverable { tag, reason } => {
                    tracing::warn!(tag, %reason, "malformed response body, dropping");
                }
                DecodedFrame::Fatal(e) => {
                    tracing::error!(error = %e, "fatal transport error, closing connection");
                    shared.closed.store(true, Ordering::Release);
                    Self::drain_pending(&shared);
                    return;
                }
            }
        }
    }

    fn drain_pending(shared: &Arc<Shared>) {
        let tags: Vec<Tag> = shared.pending.iter().map(|e| *e.key()).collect();
        for tag in tags {
            if let Some((_, tx)) = shared.pending.remove(&tag) {
                let _ = tx.send(Err(ClientError::ConnectionClosed));
            }
        }
    }

    /// Begin a new transaction, returning once the tag has been
    /// allocated and the request written — before the response
    /// arrives. Split from the response so the caller can record the
    /// tag for a later [`ClientConnection::cancel`].
    pub async fn start_call(&self, request: Request) -> Result<Call, ClientError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(ClientError::ConnectionClosed);
        }

        let (tx, rx) = oneshot::channel();
        let tag = {
            let mut allocator = self.shared.tag_allocator.lock().await;
            let tag = allocator.allocate(&self.shared.pending)?;
            self.shared.pending.insert(tag, tx);
            tag
        };

        if let Err(e) = self.shared.writer.write(&Frame::new(tag, Message::Request(request))).await
        {
            self.shared.pending.remove(&tag);
            return Err(e.into());
        }

        Ok(Call { tag, rx })
    }

    /// Issue a request and await its response. Equivalent to
    /// `start_call(request).await?.await_response().await`.
    pub async fn call(&self, request: Request) -> Result<Response, ClientError> {
        self.start_call(request).await?.await_response().await
    }

    /// Cancel a pending call: send `Tflush{oldtag}` and await
    /// `Rflush`. Per 9P, the server guarantees no further response for
    /// `oldtag` once it replies to the flush, so `oldtag` is safe to
    /// reuse only after this returns.
    pub async fn cancel(&self, oldtag: Tag) -> Result<(), ClientError> {
        let flush = self.start_call(Request::Flush { oldtag }).await?;
        match flush.await_response().await? {
            Response::Flush => {
                self.shared.pending.remove(&oldtag);
                Ok(())
            }
            other => Err(ClientError::ProtocolViolation(format!(
                "expected Rflush, got {other:?}"
            ))),
        }
    }

    pub fn allocate_fid(&self) -> Fid {
        self.shared.fid_allocator.allocate()
    }

    /// Close the connection: shuts down the write half and aborts the
    /// background read loop. Any calls still awaiting a response
    /// resolve with [`ClientError::ConnectionClosed`].
    pub async fn close(self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.writer.close().await;
        self.read_task.abort();
        Self::drain_pending(&self.shared);
    }
}
