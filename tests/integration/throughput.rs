//! Many concurrent in-flight calls on one connection: the server's
//! `JoinSet`-based dispatch loop must answer every one exactly once,
//! and the shared `FrameWriter` must never interleave their bytes.

use std::sync::Arc;

use anyhow::Context;
use ninep_core::message::{Request, Response};
use ninep_core::EngineConfig;

use crate::infra::connected_pair;

#[tokio::test]
async fn one_hundred_concurrent_calls_each_get_their_own_response() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let (client, handle, server_task) = connected_pair(&config).await?;
    let client = Arc::new(client);

    let mut tasks = Vec::new();
    for i in 0..100u32 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            let response = client
                .call(Request::Read { fid: 0, offset: 0, count: 4 + (i % 8) })
                .await
                .unwrap();
            match response {
                Response::Read { data } => data.len() as u32,
                other => panic!("expected Response::Read, got {other:?}"),
            }
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let len = task.await.context("call task panicked")?;
        assert_eq!(len, 4 + (i as u32 % 8));
    }

    handle.disconnect().await;
    server_task.await.context("server task panicked")?;
    Ok(())
}
