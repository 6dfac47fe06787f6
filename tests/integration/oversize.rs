//! A frame whose declared size exceeds the negotiated `msize` is fatal:
//! the server tears the connection down rather than buffering an
//! unbounded amount of attacker-controlled data.

use anyhow::Context;
use bytes::BufMut;
use ninep_core::message::{decode_message, encode_message, Message, Request, TVERSION};
use ninep_core::{EngineConfig, Frame, NOTAG};
use ninep_server::Connection;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn frame_larger_than_msize_closes_the_connection() -> anyhow::Result<()> {
    let (mut raw_client, server_io) = tokio::io::duplex(1 << 16);
    let config = EngineConfig { msize: 64, ..EngineConfig::default() };

    let server_task =
        tokio::spawn(async move { Connection::connect(server_io, &config, None).await });

    // Tversion negotiates msize=64 first.
    let mut buf = bytes::BytesMut::new();
    encode_message(
        &Frame::new(
            NOTAG,
            Message::Request(Request::Version { msize: 64, version: "9P2000".to_string() }),
        ),
        &mut buf,
    )?;
    raw_client.write_all(&buf).await?;
    let mut reply_buf = vec![0u8; 4096];
    let n = raw_client.read(&mut reply_buf).await?;
    decode_message(&reply_buf[..n])?;

    // A declared frame size far exceeding the 64-byte msize. This never
    // needs a real 9P message type since the reader rejects it before
    // attempting to parse the body.
    let mut oversize = bytes::BytesMut::new();
    oversize.put_u32_le(10_000);
    oversize.put_u8(TVERSION);
    oversize.put_u16_le(NOTAG);
    raw_client.write_all(&oversize).await?;

    // The attach handshake never completes: the connection is fatally
    // closed first.
    let result = server_task.await.context("server task panicked")?;
    assert!(result.is_err(), "oversize frame should have failed the handshake");
    Ok(())
}
