//! Backend node representation and health probing.
//!
//! # Responsibilities
//! - Represent a single backend target
//! - Probe `GET {address}/status` and judge liveness
//! - Track traffic counters (requests, successes, failures)
//! - Track in-flight requests (for Least Connections)

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use serde::Deserialize;
use tokio::time;
use url::Url;

/// Shared upstream client type used by the gateway and the health checker.
pub type HttpClient = Client<HttpConnector, Body>;

/// Probe responses larger than this are considered malformed.
const PROBE_BODY_LIMIT: usize = 64 * 1024;

/// Expected payload of a `GET /status` probe.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeResponse {
    status: String,
    #[allow(dead_code)]
    timestamp: String,
}

/// Traffic counters for a single node.
///
/// Incremented lock-free by both the health checker and the gateway. The
/// counters are monotonic and independent; they are read for logging, metrics,
/// and tests only, so they carry no cross-field consistency requirement and
/// stay outside the pool lock.
#[derive(Debug, Default)]
pub struct NodeStats {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl NodeStats {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// A single backend target.
///
/// The liveness flag does not live here: it is part of the pool's guarded
/// state so flag flips and the aggregate active count stay atomic together.
#[derive(Debug)]
pub struct Node {
    base_url: Url,
    /// Traffic counters.
    pub stats: NodeStats,
    /// Requests currently being forwarded to this node.
    in_flight: AtomicUsize,
    /// Unix millis of the most recent probe start. 0 = never probed.
    last_check_ms: AtomicU64,
}

impl Node {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            stats: NodeStats::default(),
            in_flight: AtomicUsize::new(0),
            last_check_ms: AtomicU64::new(0),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Authority (`host:port`) for rewriting forwarded request URIs.
    pub fn authority(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Track one forwarded request for the duration of the returned guard.
    pub fn track_in_flight(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard { node: self.clone() }
    }

    /// Time of the most recent probe, if any.
    pub fn last_check(&self) -> Option<SystemTime> {
        match self.last_check_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(UNIX_EPOCH + Duration::from_millis(ms)),
        }
    }

    /// Probe `GET {address}/status` with a bounded timeout.
    ///
    /// Liveness is true iff the transport succeeds, the status is 200, and
    /// the JSON body's `status` field equals `"ok"` case-insensitively.
    /// Increments the request counter before the call and the success or
    /// failure counter after, regardless of who invoked it.
    pub async fn probe(&self, client: &HttpClient, timeout: Duration) -> bool {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_check_ms.store(now_ms, Ordering::Relaxed);
        self.stats.record_request();

        let alive = self.probe_inner(client, timeout).await;
        if alive {
            self.stats.record_success();
        } else {
            self.stats.record_failure();
        }
        alive
    }

    async fn probe_inner(&self, client: &HttpClient, timeout: Duration) -> bool {
        let uri = format!("{}/status", self.base_url.as_str().trim_end_matches('/'));
        let request = match Request::builder()
            .method("GET")
            .uri(&uri)
            .header("user-agent", "httplb-health-check")
            .body(Body::empty())
        {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(node = %self.base_url, error = %e, "failed to build probe request");
                return false;
            }
        };

        let response = match time::timeout(timeout, client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(node = %self.base_url, error = %e, "probe failed: connection error");
                return false;
            }
            Err(_) => {
                tracing::warn!(node = %self.base_url, "probe failed: timeout");
                return false;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::warn!(node = %self.base_url, status = %response.status(), "probe failed: non-200 status");
            return false;
        }

        let body = match axum::body::to_bytes(Body::new(response.into_body()), PROBE_BODY_LIMIT).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(node = %self.base_url, error = %e, "probe failed: could not read body");
                return false;
            }
        };

        match serde_json::from_slice::<ProbeResponse>(&body) {
            Ok(payload) if payload.status.eq_ignore_ascii_case("ok") => true,
            Ok(payload) => {
                tracing::warn!(node = %self.base_url, status = %payload.status, "probe failed: unexpected status payload");
                false
            }
            Err(e) => {
                tracing::warn!(node = %self.base_url, error = %e, "probe failed: malformed body");
                false
            }
        }
    }
}

/// RAII guard that decrements the in-flight count on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    node: Arc<Node>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.node.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(addr: &str) -> Arc<Node> {
        Arc::new(Node::new(Url::parse(addr).unwrap()))
    }

    #[test]
    fn counters_are_independent() {
        let n = node("http://localhost:8081");
        n.stats.record_request();
        n.stats.record_request();
        n.stats.record_success();
        n.stats.record_failure();

        assert_eq!(n.stats.requests(), 2);
        assert_eq!(n.stats.successes(), 1);
        assert_eq!(n.stats.failures(), 1);
    }

    #[test]
    fn in_flight_guard_decrements_on_drop() {
        let n = node("http://localhost:8081");
        {
            let _a = n.track_in_flight();
            let _b = n.track_in_flight();
            assert_eq!(n.in_flight(), 2);
        }
        assert_eq!(n.in_flight(), 0);
    }

    #[test]
    fn authority_includes_port() {
        let n = node("http://localhost:8081");
        assert_eq!(n.authority(), "localhost:8081");

        let n = node("http://example.com");
        assert_eq!(n.authority(), "example.com");
    }
}
