//! REST dispatcher integration tests
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use courier::{Requester, RestError, Snowflake};
use courier_rest::{routes, RestRequest};
use integration_tests::{MessageReply, TestServer, CHANNEL_ID, OTHER_CHANNEL_ID};
use serde_json::json;

fn requester(server: &TestServer) -> anyhow::Result<Arc<Requester>> {
    Ok(Arc::new(Requester::with_reqwest(
        &server.rest_config(),
        "Bot test-token",
    )?))
}

fn channel(id: u64) -> Snowflake {
    Snowflake::new(id as i64)
}

#[tokio::test]
async fn test_send_message() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let rest = requester(&server)?;

    let message = rest.send_message(channel(CHANNEL_ID), "hello").await?;
    assert_eq!(message.content, "hello");
    assert_eq!(message.channel_id, channel(CHANNEL_ID));
    Ok(())
}

#[tokio::test]
async fn test_exhausted_bucket_waits_for_reset() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server.state.script_messages(&[MessageReply::Exhausted { reset_after: 0.5 }]);
    let rest = requester(&server)?;

    rest.send_message(channel(CHANNEL_ID), "first").await?;
    rest.send_message(channel(CHANNEL_ID), "second").await?;

    let hits = server.state.hits();
    assert_eq!(hits.len(), 2);
    let gap = hits[1].started.duration_since(hits[0].finished);
    assert!(gap >= Duration::from_millis(450), "gap was {gap:?}");
    Ok(())
}

#[tokio::test]
async fn test_exhausted_bucket_does_not_block_other_channels() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server.state.script_messages(&[MessageReply::Exhausted { reset_after: 5.0 }]);
    let rest = requester(&server)?;

    rest.send_message(channel(CHANNEL_ID), "drains the bucket").await?;
    tokio::time::timeout(
        Duration::from_secs(1),
        rest.send_message(channel(OTHER_CHANNEL_ID), "other bucket"),
    )
    .await??;
    Ok(())
}

#[tokio::test]
async fn test_too_many_requests_is_retried_after_delay() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server.state.script_messages(&[MessageReply::TooMany { retry_after: 0.5 }]);
    let rest = requester(&server)?;

    let message = rest.send_message(channel(CHANNEL_ID), "eventually").await?;
    assert_eq!(message.content, "eventually");

    let hits = server.state.hits();
    assert_eq!(hits.len(), 2);
    let gap = hits[1].started.duration_since(hits[0].finished);
    assert!(gap >= Duration::from_millis(450), "gap was {gap:?}");
    Ok(())
}

#[tokio::test]
async fn test_opting_out_of_queueing_reports_retry_after() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server.state.script_messages(&[MessageReply::Exhausted { reset_after: 5.0 }]);
    let rest = requester(&server)?;

    rest.send_message(channel(CHANNEL_ID), "drains the bucket").await?;

    let channel_id = CHANNEL_ID.to_string();
    let route = routes::SEND_MESSAGE.compile(&[&channel_id])?;
    let request = RestRequest::new(route)
        .with_body(json!({ "content": "impatient" }))
        .without_queue();

    match rest.execute(request).await {
        Err(RestError::RateLimited { retry_after, global }) => {
            assert!(!global);
            assert!(retry_after > Duration::from_secs(4));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(server.state.hits().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_server_errors_are_retried() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server
        .state
        .script_messages(&[MessageReply::ServerError, MessageReply::ServerError]);
    let rest = requester(&server)?;

    rest.send_message(channel(CHANNEL_ID), "third time lucky").await?;
    assert_eq!(server.state.hits().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_server_errors_give_up() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server.state.script_messages(&[MessageReply::ServerError; 3]);
    let rest = requester(&server)?;

    let result = rest.send_message(channel(CHANNEL_ID), "never").await;
    assert!(matches!(
        result,
        Err(RestError::Server { status: 502, attempts: 3 })
    ));
    Ok(())
}

#[tokio::test]
async fn test_same_bucket_is_serialized() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server.state.set_latency(Duration::from_millis(200));
    let rest = requester(&server)?;

    let (a, b) = tokio::join!(
        rest.send_message(channel(CHANNEL_ID), "a"),
        rest.send_message(channel(CHANNEL_ID), "b"),
    );
    a?;
    b?;
    assert_eq!(server.state.peak_for(CHANNEL_ID), 1);
    Ok(())
}

#[tokio::test]
async fn test_different_buckets_run_concurrently() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server.state.set_latency(Duration::from_millis(200));
    let rest = requester(&server)?;

    let (a, b) = tokio::join!(
        rest.send_message(channel(CHANNEL_ID), "a"),
        rest.send_message(channel(OTHER_CHANNEL_ID), "b"),
    );
    a?;
    b?;
    assert_eq!(server.state.total_peak.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_rejects_new_requests() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let rest = requester(&server)?;

    rest.shutdown();
    let result = rest.send_message(channel(CHANNEL_ID), "rejected").await;
    assert!(matches!(result, Err(RestError::Shutdown)));
    assert!(server.state.hits().is_empty());
    Ok(())
}
