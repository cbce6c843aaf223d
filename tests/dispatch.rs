//! End-to-end dispatch tests over loopback sockets.

use std::collections::HashSet;
use std::sync::Arc;

use balancing_proxy::net::BackendAddress;
use balancing_proxy::proxy::UNAVAILABLE_PAYLOAD;
use balancing_proxy::session::{MemorySessionStore, SessionStore};
use balancing_proxy::Algorithm;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;

use common::{body_of, send_request, GET};

#[tokio::test]
async fn relays_one_exchange() {
    let backend = common::start_mock_backend("hello from backend").await;
    let proxy = common::start_proxy(common::proxy_config(&[backend.addr])).await;

    let response = send_request(proxy.addr, GET).await;
    assert!(response.starts_with(b"HTTP/1.1 200 OK"));
    assert_eq!(body_of(&response), "hello from backend");
    assert_eq!(backend.hits(), 1);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn request_bytes_pass_through_unmodified() {
    let echo = common::start_echo_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&[echo])).await;

    let request = b"PING\x00\x01\x02 not http at all";
    let response = send_request(proxy.addr, request).await;
    assert_eq!(response, request);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn new_clients_rotate_across_backends() {
    let a = common::start_mock_backend("a").await;
    let b = common::start_mock_backend("b").await;
    let proxy = common::start_proxy(common::proxy_config(&[a.addr, b.addr])).await;

    let mut bodies = HashSet::new();
    for _ in 0..2 {
        bodies.insert(body_of(&send_request(proxy.addr, GET).await));
    }
    assert_eq!(bodies, HashSet::from(["a".to_string(), "b".to_string()]));

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn unavailable_payload_when_no_backends() {
    let proxy = common::start_proxy(common::proxy_config(&[])).await;

    let response = send_request(proxy.addr, b"").await;
    assert_eq!(response, UNAVAILABLE_PAYLOAD);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn unavailable_payload_after_client_already_sent_request() {
    let proxy = common::start_proxy(common::proxy_config(&[])).await;

    let response = send_request(proxy.addr, GET).await;
    assert_eq!(response, UNAVAILABLE_PAYLOAD);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn unavailable_payload_when_algorithm_unsupported() {
    let backend = common::start_mock_backend("never").await;
    let mut config = common::proxy_config(&[backend.addr]);
    config.balancing.algorithm = "least_connection".into();
    let proxy = common::start_proxy(config).await;

    let response = send_request(proxy.addr, b"").await;
    assert_eq!(response, UNAVAILABLE_PAYLOAD);
    assert_eq!(backend.hits(), 0);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn dial_failure_retries_on_next_backend() {
    let (dead, live) = common::dead_then_live("survivor").await;
    let proxy = common::start_proxy(common::proxy_config(&[dead, live.addr])).await;

    // Cursor 0 points at the dead backend; the client must not notice.
    let response = send_request(proxy.addr, GET).await;
    assert_eq!(body_of(&response), "survivor");
    assert_eq!(live.hits(), 1);

    let dead = BackendAddress::from(dead);
    assert_eq!(proxy.balancer.registry().health(&dead), Some(false));
    assert_eq!(proxy.balancer.healthy_servers(), vec![BackendAddress::from(live.addr)]);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn unavailable_payload_after_exhausted_retry() {
    let first = common::dead_address().await;
    let second = common::dead_address().await;
    let proxy = common::start_proxy(common::proxy_config(&[first, second])).await;

    let response = send_request(proxy.addr, GET).await;
    assert_eq!(response, UNAVAILABLE_PAYLOAD);
    assert!(proxy.balancer.healthy_servers().is_empty());

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn empty_request_closes_without_dialing() {
    let backend = common::start_mock_backend("unused").await;
    let proxy = common::start_proxy(common::proxy_config(&[backend.addr])).await;

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    stream.shutdown().await.unwrap();
    let response = common::read_until_closed(&mut stream).await;

    assert!(response.is_empty());
    assert_eq!(backend.hits(), 0);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn key_hash_routes_through_session_store() {
    let a = common::start_mock_backend("a").await;
    let b = common::start_mock_backend("b").await;
    let mut config = common::proxy_config(&[a.addr, b.addr]);
    config.balancing.algorithm = "ip_hash".into();

    let store = MemorySessionStore::default();
    let proxy = common::start_proxy_with_store(config, Arc::new(store.clone())).await;
    assert_eq!(proxy.balancer.algorithm(), Algorithm::IpHash);

    let response = send_request(proxy.addr, GET).await;
    let body = body_of(&response);
    assert!(body == "a" || body == "b");
    assert_eq!(store.len(), 1);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_persists_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");

    let backend = common::start_mock_backend("persisted").await;
    let store = MemorySessionStore::new(Some(path.clone()));
    let proxy = common::start_proxy_with_store(common::proxy_config(&[backend.addr]), Arc::new(store)).await;

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    let client = stream.local_addr().unwrap();
    stream.write_all(GET).await.unwrap();
    common::read_until_closed(&mut stream).await;

    proxy.stop().await.unwrap();

    let reloaded = MemorySessionStore::load_from_file(&path).unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.get(&client.to_string()), Some(backend.addr.to_string()));
}

#[tokio::test]
async fn stopping_refuses_new_connections() {
    let backend = common::start_mock_backend("bye").await;
    let proxy = common::start_proxy(common::proxy_config(&[backend.addr])).await;
    let addr = proxy.addr;

    proxy.stop().await.unwrap();
    assert!(TcpStream::connect(addr).await.is_err());
}
