//! Flush/cancel: the client can ask to cancel an outstanding call; the
//! server always acknowledges but (per base 9P2000) cannot actually
//! interrupt work already handed to the receive callback.

use anyhow::Context;
use ninep_core::message::Request;
use ninep_core::EngineConfig;

use crate::infra::connected_pair;

#[tokio::test]
async fn cancel_completes_even_though_the_original_call_already_finished() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let (client, handle, server_task) = connected_pair(&config).await?;

    let fid = client.allocate_fid();
    let call = client
        .start_call(Request::Open { fid, mode: 0 })
        .await
        .context("Topen failed")?;
    let tag = call.tag();

    // The echo backend answers instantly, so by the time cancel fires
    // the transaction has almost certainly already completed — flush
    // must still succeed without upsetting the connection.
    let _ = call.await_response().await.context("awaiting Topen response failed")?;
    client.cancel(tag).await.context("cancel failed")?;

    handle.disconnect().await;
    client.close().await;
    server_task.await.context("server task panicked")?;
    Ok(())
}

#[tokio::test]
async fn distinct_calls_get_distinct_tags() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let (client, handle, server_task) = connected_pair(&config).await?;

    let fid_a = client.allocate_fid();
    let fid_b = client.allocate_fid();
    assert_ne!(fid_a, fid_b);

    let call_a = client.start_call(Request::Open { fid: fid_a, mode: 0 }).await.context("first Topen failed")?;
    let call_b = client.start_call(Request::Open { fid: fid_b, mode: 0 }).await.context("second Topen failed")?;
    assert_ne!(call_a.tag(), call_b.tag());

    call_a.await_response().await.context("first response failed")?;
    call_b.await_response().await.context("second response failed")?;

    handle.disconnect().await;
    client.close().await;
    server_task.await.context("server task panicked")?;
    Ok(())
}
