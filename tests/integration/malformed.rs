//! A malformed request body must not take the whole connection down:
//! the server replies `Rerror` at the recovered tag and keeps serving
//! later requests.

use anyhow::Context;
use bytes::BufMut;
use ninep_core::message::{decode_message, encode_message, Message, Request, Response, TWALK};
use ninep_core::{EngineConfig, Frame, NOFID, NOTAG};
use ninep_server::Connection;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::infra::echo_filesystem;

async fn send(client: &mut tokio::io::DuplexStream, tag: u16, message: Message) -> anyhow::Result<()> {
    let mut buf = bytes::BytesMut::new();
    encode_message(&Frame::new(tag, message), &mut buf)?;
    client.write_all(&buf).await?;
    Ok(())
}

async fn recv(client: &mut tokio::io::DuplexStream) -> anyhow::Result<Frame> {
    let mut buf = vec![0u8; 4096];
    let n = client.read(&mut buf).await?;
    let (frame, _) = decode_message(&buf[..n])?;
    Ok(frame)
}

#[tokio::test]
async fn malformed_body_gets_rerror_and_the_connection_survives() -> anyhow::Result<()> {
    let (mut raw_client, server_io) = tokio::io::duplex(1 << 16);
    let config = EngineConfig::default();

    let server_task = tokio::spawn(async move {
        let connection = Connection::connect(server_io, &config, None).await.unwrap();
        connection.run(echo_filesystem()).await.unwrap();
    });

    send(&mut raw_client, NOTAG, Message::Request(Request::Version {
        msize: 8192,
        version: "9P2000".to_string(),
    })).await?;
    recv(&mut raw_client).await?;
    send(&mut raw_client, 1, Message::Request(Request::Attach {
        fid: 0,
        afid: NOFID,
        uname: "glenda".to_string(),
        aname: "".to_string(),
    })).await?;
    recv(&mut raw_client).await?;

    // A Twalk frame whose declared size covers only the fid field,
    // leaving no room for newfid or the wname count the decoder needs.
    let mut raw = bytes::BytesMut::new();
    raw.put_u32_le(11); // 7-byte header + 4-byte body (fid only)
    raw.put_u8(TWALK);
    raw.put_u16_le(77);
    raw.put_u32_le(0); // fid; newfid + nwname are missing
    raw_client.write_all(&raw).await?;

    let reply = recv(&mut raw_client).await?;
    assert_eq!(reply.tag, 77);
    assert!(matches!(reply.message, Message::Response(Response::Err { .. })));

    send(&mut raw_client, 2, Message::Request(Request::Clunk { fid: 0 })).await?;
    let reply = recv(&mut raw_client).await?;
    assert_eq!(reply.message, Message::Response(Response::Clunk));

    drop(raw_client);
    server_task.await.context("server task panicked")?;
    Ok(())
}
