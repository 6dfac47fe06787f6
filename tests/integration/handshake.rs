//! Handshake and basic request/response round trips through a real
//! client connection and a real server dispatch loop.

use anyhow::Context;
use bytes::BufMut;
use ninep_core::message::{decode_message, encode_message, Message, Request, Response, TREAD};
use ninep_core::{EngineConfig, Frame, NOFID, NOTAG};
use ninep_server::Connection;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::infra::connected_pair;

#[tokio::test]
async fn client_attaches_and_reads_a_file() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let (client, handle, server_task) = connected_pair(&config).await?;

    assert_eq!(client.msize, config.msize);

    let fid = client.allocate_fid();
    let walk = client
        .call(Request::Walk { fid: client.root_fid, newfid: fid, wname: vec!["greeting".to_string()] })
        .await
        .context("Twalk failed")?;
    assert!(matches!(walk, Response::Walk { wqid } if wqid.len() == 1));

    let open = client.call(Request::Open { fid, mode: 0 }).await.context("Topen failed")?;
    assert!(matches!(open, Response::Open { .. }));

    let read = client
        .call(Request::Read { fid, offset: 0, count: 11 })
        .await
        .context("Tread failed")?;
    match read {
        Response::Read { data } => assert_eq!(data.len(), 11),
        other => panic!("expected Response::Read, got {other:?}"),
    }

    client.call(Request::Clunk { fid }).await.context("Tclunk failed")?;

    handle.disconnect().await;
    client.close().await;
    server_task.await.context("server task panicked")?;
    Ok(())
}

#[tokio::test]
async fn negotiated_msize_is_the_smaller_of_the_two_offers() -> anyhow::Result<()> {
    let config = EngineConfig { msize: 2048, ..EngineConfig::default() };
    let (client, handle, server_task) = connected_pair(&config).await?;

    assert_eq!(client.msize, 2048);

    handle.disconnect().await;
    client.close().await;
    server_task.await.context("server task panicked")?;
    Ok(())
}

#[tokio::test]
async fn remote_error_surfaces_as_client_error_remote() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let (client, handle, server_task) = connected_pair(&config).await?;

    let err = client
        .call(Request::Auth {
            afid: NOFID,
            uname: "glenda".to_string(),
            aname: "".to_string(),
        })
        .await
        .expect_err("Tauth should be rejected by the test backend");

    assert!(matches!(err, ninep_client::ClientError::Remote(ref msg) if msg.contains("auth")));

    handle.disconnect().await;
    client.close().await;
    server_task.await.context("server task panicked")?;
    Ok(())
}

/// A well-formed frame of the wrong type during the handshake gets an
/// `Rerror` reply at its own tag before the connection is torn down,
/// matching the policy applied to malformed bodies.
#[tokio::test]
async fn wrong_message_before_attach_gets_rerror_then_disconnect() -> anyhow::Result<()> {
    let (mut raw_client, server_io) = tokio::io::duplex(1 << 16);
    let config = EngineConfig::default();

    let server_task = tokio::spawn(async move { Connection::connect(server_io, &config, None).await });

    let mut buf = bytes::BytesMut::new();
    encode_message(
        &Frame::new(
            NOTAG,
            Message::Request(Request::Version { msize: 8192, version: "9P2000".to_string() }),
        ),
        &mut buf,
    )?;
    raw_client.write_all(&buf).await?;
    let mut reply_buf = vec![0u8; 4096];
    let n = raw_client.read(&mut reply_buf).await?;
    let (reply, _) = decode_message(&reply_buf[..n])?;
    assert_eq!(reply.message, Message::Response(Response::Version {
        msize: 8192,
        version: "9P2000".to_string(),
    }));

    // Tread instead of the expected Tattach.
    let mut raw = bytes::BytesMut::new();
    raw.put_u32_le(7 + 4 + 8 + 4);
    raw.put_u8(TREAD);
    raw.put_u16_le(55);
    raw.put_u32_le(0); // fid
    raw.put_u64_le(0); // offset
    raw.put_u32_le(0); // count
    raw_client.write_all(&raw).await?;

    let n = raw_client.read(&mut reply_buf).await?;
    let (reply, _) = decode_message(&reply_buf[..n])?;
    assert_eq!(reply.tag, 55);
    assert!(matches!(reply.message, Message::Response(Response::Err { .. })));

    let result = server_task.await.context("server task panicked")?;
    assert!(result.is_err(), "wrong handshake message should fail the connection");
    Ok(())
}
