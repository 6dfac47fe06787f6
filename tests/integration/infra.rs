//! Shared harness: an in-memory "echo filesystem" receive callback and
//! a helper that wires up a real server dispatch loop and a real client
//! connection over a `tokio::io::duplex` pipe.

use std::sync::Arc;

use anyhow::Context;
use ninep_core::message::{Request, Response};
use ninep_core::{EngineConfig, Qid, Stat};
use ninep_server::{AttachInfo, Connection, ConnectionHandle, ReceiveCallback};

/// A minimal single-file backend: `Read`/`Write` round-trip through a
/// byte buffer keyed by nothing in particular (every fid sees the same
/// file) — enough surface to exercise the wire protocol without a real
/// filesystem.
pub fn echo_filesystem() -> ReceiveCallback {
    Arc::new(|_info: Arc<AttachInfo>, request: Request| {
        Box::pin(async move {
            match request {
                Request::Walk { wname, .. } => {
                    let wqid = wname.iter().enumerate().map(|(i, _)| Qid::dir(0, i as u64)).collect();
                    Ok(Response::Walk { wqid })
                }
                Request::Open { .. } => Ok(Response::Open { qid: Qid::file(0, 1), iounit: 0 }),
                Request::Read { count, .. } => {
                    let data = b"hello from the test filesystem"
                        .iter()
                        .copied()
                        .cycle()
                        .take(count as usize)
                        .collect();
                    Ok(Response::Read { data })
                }
                Request::Write { data, .. } => Ok(Response::Write { count: data.len() as u32 }),
                Request::Stat { .. } => Ok(Response::Stat {
                    stat: Stat {
                        dev_type: 0,
                        dev: 0,
                        qid: Qid::file(0, 1),
                        mode: 0o644,
                        atime: 0,
                        mtime: 0,
                        length: 0,
                        name: "test-file".to_string(),
                        uid: "glenda".to_string(),
                        gid: "glenda".to_string(),
                        muid: "glenda".to_string(),
                    },
                }),
                Request::Clunk { .. } => Ok(Response::Clunk),
                Request::Remove { .. } => Ok(Response::Remove),
                Request::Create { .. } => Ok(Response::Create { qid: Qid::file(0, 2), iounit: 0 }),
                Request::Wstat { .. } => Ok(Response::Wstat),
                Request::Auth { .. } => Err("auth not supported".to_string()),
                Request::Version { .. } | Request::Attach { .. } | Request::Flush { .. } => {
                    Err("unexpected handshake message after attach".to_string())
                }
            }
        })
    })
}

/// Spin up a server dispatch loop and a client connection joined by an
/// in-process duplex pipe, both past the handshake. Returns the client,
/// a handle to stop the server, and the server's join handle.
pub async fn connected_pair(
    config: &EngineConfig,
) -> anyhow::Result<(ninep_client::ClientConnection, ConnectionHandle, tokio::task::JoinHandle<()>)>
{
    let (client_io, server_io) = tokio::io::duplex(1 << 20);

    let server_connection = {
        let config = config.clone();
        tokio::spawn(async move { Connection::connect(server_io, &config, None).await })
            .await
            .context("server handshake task panicked")?
            .context("server handshake failed")?
    };
    let handle = server_connection.handle();
    let server_task = tokio::spawn(async move {
        server_connection.run(echo_filesystem()).await.unwrap();
    });

    let client = ninep_client::ClientConnection::connect(client_io, config, "glenda", "")
        .await
        .context("client handshake failed")?;

    Ok((client, handle, server_task))
}
