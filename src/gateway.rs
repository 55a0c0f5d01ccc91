//! HTTP gateway: accepts inbound requests and forwards each one to a
//! dispatched node.
//!
//! # Per-request sequence
//! ```text
//! RECEIVED -> (ready? else 503) -> DISPATCHED -> FORWARDED
//!          -> SUCCEEDED (response streamed back, any status)
//!          |  FAILED    (502, node marked down immediately)
//! ```
//!
//! Success is defined at the transport layer: a completed upstream response
//! counts as a success even if its status is 5xx. Only transport-level
//! failures (connection refused, reset, timeout) count as failures and mark
//! the node down.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::balancer::node::{HttpClient, Node};
use crate::balancer::pool::NodePool;
use crate::observability;

const NO_AVAILABLE_SERVERS: &str = "No available servers";

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<NodePool>,
    pub client: HttpClient,
}

/// The inbound HTTP server.
pub struct Gateway {
    router: Router,
}

impl Gateway {
    pub fn new(pool: Arc<NodePool>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = AppState { pool, client };

        let router = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http());

        Self { router }
    }

    /// Serve until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("gateway received shutdown signal");
            })
            .await?;

        tracing::info!("gateway stopped");
        Ok(())
    }
}

async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    // Not ready means no node can serve; answer immediately rather than
    // attempting a dispatch that cannot succeed.
    if !state.pool.is_ready() {
        observability::record_request(&method, 503, "none", start);
        return unavailable();
    }

    let Some((index, node)) = state.pool.next_server() else {
        observability::record_request(&method, 503, "none", start);
        return unavailable();
    };

    let _in_flight = node.track_in_flight();

    let outbound = match rewrite_for_node(request, &node) {
        Ok(outbound) => outbound,
        Err(e) => {
            tracing::error!(request_id = %request_id, node = %node.base_url(), error = %e, "failed to rewrite request URI");
            observability::record_request(&method, 500, node.base_url().as_str(), start);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build upstream request").into_response();
        }
    };

    node.stats.record_request();

    match state.client.request(outbound).await {
        Ok(response) => {
            // Transport succeeded; upstream status is the caller's business.
            node.stats.record_success();
            let status = response.status();
            observability::record_request(&method, status.as_u16(), node.base_url().as_str(), start);
            tracing::debug!(
                request_id = %request_id,
                node = %node.base_url(),
                status = %status,
                "request forwarded"
            );
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            node.stats.record_failure();
            state.pool.set_active(index, false);
            observability::record_request(&method, 502, node.base_url().as_str(), start);
            tracing::error!(
                request_id = %request_id,
                node = %node.base_url(),
                error = %e,
                "forwarding failed, node marked down"
            );
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// Rewrite only scheme and authority to point at the node; method, path,
/// query, headers, and body pass through verbatim. The Host header is
/// dropped so the client derives it from the new authority.
fn rewrite_for_node(
    request: Request<Body>,
    node: &Node,
) -> Result<Request<Body>, axum::http::Error> {
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(
        Scheme::try_from(node.base_url().scheme()).unwrap_or(Scheme::HTTP),
    );
    uri_parts.authority = Some(Authority::from_str(&node.authority())?);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = Uri::from_parts(uri_parts)?;
    parts.headers.remove(header::HOST);

    Ok(Request::from_parts(parts, body))
}

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, NO_AVAILABLE_SERVERS).into_response()
}
