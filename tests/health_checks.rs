//! Probe contract and health round integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use httplb::balancer::node::{HttpClient, Node};
use httplb::config::HealthCheckConfig;
use httplb::{Algorithm, HealthChecker};

mod common;

fn probe_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

fn checker_config() -> HealthCheckConfig {
    HealthCheckConfig {
        interval_secs: 60,
        timeout_secs: 1,
    }
}

#[tokio::test]
async fn probe_accepts_ok_status_case_insensitively() {
    let addr = common::spawn_backend(|_| async {
        (200, r#"{"status":"OK","timestamp":"2026-08-24T00:00:00Z"}"#.to_string())
    })
    .await;

    let node = Node::new(Url::parse(&format!("http://{}", addr)).unwrap());
    assert!(node.last_check().is_none());
    assert!(node.probe(&probe_client(), Duration::from_secs(1)).await);
    assert_eq!(node.stats.requests(), 1);
    assert_eq!(node.stats.successes(), 1);
    assert_eq!(node.stats.failures(), 0);
    assert!(node.last_check().is_some());
}

#[tokio::test]
async fn probe_rejects_non_ok_payload() {
    let addr = common::spawn_backend(|_| async {
        (200, r#"{"status":"fail","timestamp":"2026-08-24T00:00:00Z"}"#.to_string())
    })
    .await;

    let node = Node::new(Url::parse(&format!("http://{}", addr)).unwrap());
    assert!(!node.probe(&probe_client(), Duration::from_secs(1)).await);
    assert_eq!(node.stats.failures(), 1);
}

#[tokio::test]
async fn probe_rejects_non_200_status() {
    let addr = common::spawn_backend(|_| async { (500, "boom".to_string()) }).await;

    let node = Node::new(Url::parse(&format!("http://{}", addr)).unwrap());
    assert!(!node.probe(&probe_client(), Duration::from_secs(1)).await);
}

#[tokio::test]
async fn probe_rejects_malformed_body() {
    let addr = common::spawn_backend(|_| async { (200, "not json".to_string()) }).await;

    let node = Node::new(Url::parse(&format!("http://{}", addr)).unwrap());
    assert!(!node.probe(&probe_client(), Duration::from_secs(1)).await);
}

#[tokio::test]
async fn probe_fails_on_connection_refused() {
    // Bind then drop to find a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let node = Node::new(Url::parse(&format!("http://{}", addr)).unwrap());
    assert!(!node.probe(&probe_client(), Duration::from_secs(1)).await);
    assert_eq!(node.stats.requests(), 1);
    assert_eq!(node.stats.failures(), 1);
}

#[tokio::test]
async fn round_activates_all_healthy_nodes() {
    // Scenario A: three healthy nodes, round-robin visits each in order.
    let healthy = Arc::new(AtomicBool::new(true));
    let a = common::spawn_node_backend("a", healthy.clone()).await;
    let b = common::spawn_node_backend("b", healthy.clone()).await;
    let c = common::spawn_node_backend("c", healthy.clone()).await;

    let pool = common::pool_for(&[a, b, c], Algorithm::RoundRobin);
    let checker = HealthChecker::new(pool.clone(), &checker_config());

    let summary = checker.round().await;
    assert_eq!(summary.active_count, 3);
    assert!(summary.ready);
    assert!(pool.is_ready());

    let picks: Vec<usize> = (0..6).map(|_| pool.next_server().unwrap().0).collect();
    assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
}

#[tokio::test]
async fn round_evicts_failing_node() {
    // Scenario B: node b starts failing probes and is excluded from dispatch.
    let always = Arc::new(AtomicBool::new(true));
    let b_healthy = Arc::new(AtomicBool::new(true));
    let a = common::spawn_node_backend("a", always.clone()).await;
    let b = common::spawn_node_backend("b", b_healthy.clone()).await;
    let c = common::spawn_node_backend("c", always.clone()).await;

    let pool = common::pool_for(&[a, b, c], Algorithm::RoundRobin);
    let checker = HealthChecker::new(pool.clone(), &checker_config());

    checker.round().await;
    assert_eq!(pool.active_count(), 3);

    b_healthy.store(false, Ordering::SeqCst);
    let summary = checker.round().await;
    assert_eq!(summary.active_count, 2);
    assert!(summary.ready);

    for _ in 0..10 {
        let (index, _) = pool.next_server().unwrap();
        assert_ne!(index, 1, "dispatch must never select the evicted node");
    }
}

#[tokio::test]
async fn round_recovers_node_on_next_success() {
    let healthy = Arc::new(AtomicBool::new(false));
    let a = common::spawn_node_backend("a", healthy.clone()).await;

    let pool = common::pool_for(&[a], Algorithm::RoundRobin);
    let checker = HealthChecker::new(pool.clone(), &checker_config());

    checker.round().await;
    assert!(!pool.is_ready());

    healthy.store(true, Ordering::SeqCst);
    let summary = checker.round().await;
    assert_eq!(summary.active_count, 1);
    assert!(pool.is_ready());
}

#[tokio::test]
async fn round_with_all_nodes_down_clears_readiness() {
    // Scenario C, dispatch-level: no active nodes, pool not ready.
    let dead = Arc::new(AtomicBool::new(false));
    let a = common::spawn_node_backend("a", dead.clone()).await;
    let b = common::spawn_node_backend("b", dead.clone()).await;

    let pool = common::pool_for(&[a, b], Algorithm::RoundRobin);
    let checker = HealthChecker::new(pool.clone(), &checker_config());

    let summary = checker.round().await;
    assert_eq!(summary.active_count, 0);
    assert!(!summary.ready);
    assert!(pool.next_server().is_none());
}
