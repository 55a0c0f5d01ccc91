//! Demo backend node.
//!
//! Answers `/` with a greeting and `/status` with the health probe contract:
//! HTTP 200 and `{"status": "ok", "timestamp": "<RFC3339>"}`. Kept as a
//! subcommand so the balancer has a first-party probe counterpart; it is not
//! part of the load-balancer core.

use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

pub fn router(addr: String) -> Router {
    Router::new()
        .route(
            "/",
            get(move || {
                let addr = addr.clone();
                async move {
                    tracing::info!("request received");
                    format!("Hello from node {}", addr)
                }
            }),
        )
        .route("/status", get(status))
}

/// Bind and serve the demo node until the process is killed.
pub async fn run(bind_address: &str) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(bind_address).await?;
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "node listening");

    axum::serve(listener, router(addr.to_string())).await
}
