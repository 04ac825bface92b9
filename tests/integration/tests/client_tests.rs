//! Client integration tests
//!
//! Drive the real `reqwest` and `tokio-tungstenite` stack against the
//! in-process mock API and gateway.
//!
//! Run with: cargo test -p integration-tests --test client_tests

use std::sync::atomic::Ordering;
use std::time::Duration;

use courier::{Client, ClientError, ConnectionStatus, GatewayEvent, RestError, Snowflake};
use integration_tests::{
    next_event, wait_until, TestServer, CHANNEL_ID, GUILD_ID, TEST_TOKEN,
};
use axum::http::StatusCode;

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_and_ready() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = Client::login(server.client_config()).await?;

    tokio::time::timeout(Duration::from_secs(10), client.await_ready()).await??;
    assert_eq!(client.status(), ConnectionStatus::Connected);

    let store = client.store();
    assert!(store.guilds.contains(Snowflake::new(GUILD_ID as i64)));
    assert!(store.channels.contains(Snowflake::new(CHANNEL_ID as i64)));
    assert_eq!(
        store.self_user().map(|u| u.username),
        Some("courier".to_string())
    );
    assert_eq!(client.gateway().session_id().as_deref(), Some("session-1"));

    assert_eq!(
        server.state.authorizations.lock()[0],
        format!("Bot {TEST_TOKEN}")
    );
    assert_eq!(server.state.compressed.lock().as_slice(), &[true]);
    let identify = server
        .state
        .frames
        .lock()
        .iter()
        .find(|f| f["op"] == 2)
        .cloned()
        .expect("identify frame");
    assert_eq!(identify["d"]["shard"], serde_json::json!([0, 1]));

    client.shutdown().await;
    assert_eq!(client.status(), ConnectionStatus::Shutdown);
    Ok(())
}

#[tokio::test]
async fn test_login_with_rejected_token() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server.state.token_replies.lock().push_back(StatusCode::FORBIDDEN);

    let result = Client::login(server.client_config()).await;
    assert!(matches!(result, Err(ClientError::InvalidToken)));
    assert_eq!(server.state.connections.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_login_retries_ambiguous_unauthorized() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    server
        .state
        .token_replies
        .lock()
        .push_back(StatusCode::UNAUTHORIZED);

    let client = Client::login(server.client_config()).await?;
    tokio::time::timeout(Duration::from_secs(10), client.await_ready()).await??;
    assert_eq!(server.state.authorizations.lock().len(), 2);

    client.shutdown().await;
    Ok(())
}

// ============================================================================
// Recovery
// ============================================================================

#[tokio::test]
async fn test_resume_after_recoverable_close() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    *server.state.close_after_ready.lock() = Some(4000);

    let client = Client::login(server.client_config()).await?;
    let mut events = client.subscribe();

    let missed = next_event(&mut events, |e| {
        matches!(e, GatewayEvent::MessageReceived(_))
    })
    .await?;
    let GatewayEvent::MessageReceived(message) = missed else {
        unreachable!()
    };
    assert_eq!(message.content, "sent while you were away");

    next_event(&mut events, |e| *e == GatewayEvent::Resumed).await?;
    tokio::time::timeout(Duration::from_secs(10), client.await_ready()).await??;

    assert_eq!(server.state.identifies.load(Ordering::SeqCst), 1);
    let resumes = server.state.resumes.lock().clone();
    assert_eq!(resumes.len(), 1);
    assert_eq!(resumes[0]["session_id"], "session-1");
    assert_eq!(resumes[0]["seq"], 2);

    // The inflater starts over on the new transport
    assert_eq!(server.state.compressed.lock().as_slice(), &[true, true]);

    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_reset_session_identifies_again() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = Client::login(server.client_config()).await?;
    tokio::time::timeout(Duration::from_secs(10), client.await_ready()).await??;

    client.reset_session().await?;
    let state = &server.state;
    wait_until("a second identify", || {
        state.identifies.load(Ordering::SeqCst) == 2
    })
    .await?;
    tokio::time::timeout(Duration::from_secs(10), client.await_ready()).await??;

    assert!(server.state.resumes.lock().is_empty());
    assert_eq!(client.gateway().session_id().as_deref(), Some("session-2"));
    assert!(!client.rest().is_shutdown());

    client.shutdown().await;
    Ok(())
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_fatal_close_shuts_client_down() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    *server.state.close_after_ready.lock() = Some(4004);

    let client = Client::login(server.client_config()).await?;
    wait_until("shutdown", || client.status() == ConnectionStatus::Shutdown).await?;

    match client.await_ready().await {
        Err(ClientError::Shutdown { reason: Some(reason) }) => {
            assert!(reason.contains("4004"), "reason was {reason}");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let rest = client.rest();
    wait_until("REST shutdown", || rest.is_shutdown()).await?;
    let send = rest
        .send_message(Snowflake::new(CHANNEL_ID as i64), "too late")
        .await;
    assert!(matches!(send, Err(RestError::Shutdown)));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(server.state.connections.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_closes_gateway() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let client = Client::login(server.client_config()).await?;
    tokio::time::timeout(Duration::from_secs(10), client.await_ready()).await??;

    client.shutdown().await;
    let state = &server.state;
    wait_until("gateway disconnect", || {
        state.disconnects.load(Ordering::SeqCst) == 1
    })
    .await?;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(server.state.connections.load(Ordering::SeqCst), 1);
    assert!(client.rest().is_shutdown());
    assert!(!client
        .gateway()
        .scheduler()
        .contains_connection(client.gateway().id()));
    Ok(())
}
