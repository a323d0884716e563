//! End-to-end tests over real TCP connections.
//!
//! Each test starts a [`GsiServer`] on an ephemeral loopback port and talks
//! to it with a raw `TcpStream`, so the request reader, the router, the
//! pipeline and the lifecycle are exercised together.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gsi_core::GsiConfig;
use gsi_server::{GsiServer, ServerError};
use gsi_types::MapPhase;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn config() -> GsiConfig {
    let mut config = GsiConfig::default();
    config.server.port = 0;
    config.server.read_timeout_secs = 2;
    config
}

async fn started(config: &GsiConfig) -> (GsiServer, SocketAddr) {
    let server = GsiServer::from_config(config);
    let addr = server.start().await.unwrap();
    (server, addr)
}

/// Send raw bytes and read until the server closes the connection.
async fn exchange(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .unwrap();
    match read {
        Ok(_) => String::from_utf8_lossy(&response).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => String::new(),
        Err(e) => panic!("unexpected read error: {e}"),
    }
}

async fn post_json(addr: SocketAddr, body: &str) -> String {
    let request = format!(
        "POST / HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    exchange(addr, request.as_bytes()).await
}

fn status(response: &str) -> u16 {
    response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn accepts_known_and_unknown_phases() {
    let (server, addr) = started(&config()).await;

    let response = post_json(addr, r#"{"map":{"name":"de_dust2","phase":"live","round":3}}"#).await;
    assert_eq!(status(&response), 200);
    assert!(response.ends_with("\r\n\r\n"));
    assert!(response.contains("Connection: close"));

    let latest = server.pipeline().tracker().latest().unwrap();
    let map = latest.state.map.as_ref().unwrap();
    assert_eq!(map.name.as_deref(), Some("de_dust2"));
    assert_eq!(map.phase.as_ref().unwrap().matched(), Some(MapPhase::Live));
    assert_eq!(map.round, Some(3));

    let response =
        post_json(addr, r#"{"map":{"name":"de_dust2","phase":"de_dust3_beta","round":4}}"#).await;
    assert_eq!(status(&response), 200);

    let latest = server.pipeline().tracker().latest().unwrap();
    assert_eq!(latest.sequence(), 2);
    let phase = latest.state.map.as_ref().unwrap().phase.as_ref().unwrap();
    assert_eq!(phase.matched(), None);
    assert_eq!(phase.raw(), "de_dust3_beta");

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_token_is_forbidden() {
    let mut config = config();
    config
        .filters
        .auth_tokens
        .insert(String::from("password"), String::from("letmein"));
    let (server, addr) = started(&config).await;

    let response = post_json(addr, r#"{"map":{"name":"de_dust2"}}"#).await;
    assert_eq!(status(&response), 403);
    let stats = server.pipeline().stats().snapshot();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.filtered, 1);
    assert!(server.pipeline().tracker().is_empty());

    let response = post_json(addr, r#"{"auth":{"password":"letmein"},"map":{}}"#).await;
    assert_eq!(status(&response), 200);
    assert_eq!(server.pipeline().tracker().next_sequence(), 2);

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejection_statuses_over_the_wire() {
    let (server, addr) = started(&config()).await;

    assert_eq!(status(&post_json(addr, "{\"map\":").await), 500);
    assert_eq!(status(&post_json(addr, "[1,2,3]").await), 500);
    assert_eq!(
        status(&post_json(addr, r#"{"player":{"position":"12.5, -3.0"}}"#).await),
        500
    );
    assert!(server.pipeline().tracker().is_empty());

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn post_without_content_length_gets_no_response() {
    let (server, addr) = started(&config()).await;

    let response = exchange(
        addr,
        b"POST / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"map\":{}}",
    )
    .await;
    assert!(response.is_empty());
    assert!(server.pipeline().tracker().is_empty());

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_body_is_refused() {
    let mut config = config();
    config.server.max_body_bytes = 16;
    let (server, addr) = started(&config).await;

    let response = exchange(
        addr,
        b"POST / HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 1000\r\n\r\n",
    )
    .await;
    assert_eq!(status(&response), 413);

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_serves_diagnostics_and_other_requests_are_not_found() {
    let (server, addr) = started(&config()).await;

    let page = exchange(addr, b"GET /anything HTTP/1.1\r\nHost: x\r\n\r\n").await;
    assert_eq!(status(&page), 200);
    assert!(page.contains("text/html"));
    assert!(page.contains("<h1>GSI Relay</h1>"));

    let text = exchange(
        addr,
        b"POST / HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\n{}",
    )
    .await;
    assert_eq!(status(&text), 404);

    let delete = exchange(addr, b"DELETE / HTTP/1.1\r\n\r\n").await;
    assert_eq!(status(&delete), 404);

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listeners_run_before_response_when_awaited() {
    let (server, addr) = started(&config()).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    server
        .pipeline()
        .listeners()
        .register_fn("recorder", move |update| {
            sink.lock().unwrap().push(update.sequence());
            Ok(())
        });
    server
        .pipeline()
        .listeners()
        .register_fn("broken", |_| Err(anyhow::anyhow!("always fails")));

    assert_eq!(status(&post_json(addr, "{}").await), 200);
    assert_eq!(status(&post_json(addr, "{}").await), 200);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lifecycle_errors() {
    let server = GsiServer::from_config(&config());
    assert!(matches!(server.stop().await, Err(ServerError::NotRunning)));

    let addr = server.start().await.unwrap();
    assert!(server.is_running().await);
    assert_eq!(server.local_addr().await, Some(addr));
    assert!(matches!(server.start().await, Err(ServerError::AlreadyRunning)));

    server.stop().await.unwrap();
    assert!(!server.is_running().await);
    assert!(matches!(server.stop().await, Err(ServerError::NotRunning)));
    assert!(TcpStream::connect(addr).await.is_err());

    let restarted = server.start().await.unwrap();
    assert_eq!(status(&post_json(restarted, "{}").await), 200);
    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn occupied_port_fails_to_bind() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = config();
    config.server.port = occupied.local_addr().unwrap().port();

    let server = GsiServer::from_config(&config);
    assert!(matches!(server.start().await, Err(ServerError::Bind { .. })));
    assert!(!server.is_running().await);
}
