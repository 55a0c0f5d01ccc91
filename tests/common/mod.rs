//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use httplb::{Algorithm, Gateway, NodePool, Shutdown};

/// Healthy probe payload matching the `/status` contract.
pub const OK_STATUS_BODY: &str = r#"{"status":"ok","timestamp":"2026-08-24T00:00:00Z"}"#;

/// Start a programmable mock backend on an ephemeral port. The closure
/// receives the request target (path + query) and returns status and body.
pub async fn spawn_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let target = read_request_target(&mut socket).await;
                        let (status, body) = f(target).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that serves the probe contract on `/status` (gated by the
/// `healthy` flag) and echoes `name` on every other path.
pub async fn spawn_node_backend(name: &'static str, healthy: Arc<AtomicBool>) -> SocketAddr {
    spawn_backend(move |target| {
        let healthy = healthy.clone();
        async move {
            if target.starts_with("/status") {
                if healthy.load(Ordering::SeqCst) {
                    (200, OK_STATUS_BODY.to_string())
                } else {
                    (500, "unhealthy".to_string())
                }
            } else {
                (200, name.to_string())
            }
        }
    })
    .await
}

/// Read the request head and extract the request target from the first line.
async fn read_request_target(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string()
}

/// Build a pool over the given backend addresses.
pub fn pool_for(addrs: &[SocketAddr], algorithm: Algorithm) -> Arc<NodePool> {
    let urls = addrs
        .iter()
        .map(|addr| Url::parse(&format!("http://{}", addr)).unwrap())
        .collect();
    Arc::new(NodePool::new(urls, algorithm))
}

/// Spawn a gateway over the pool on an ephemeral port.
pub async fn spawn_gateway(pool: Arc<NodePool>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let gateway = Gateway::new(pool);
    tokio::spawn(async move {
        let _ = gateway.run(listener, rx).await;
    });
    (addr, shutdown)
}

/// A reqwest client that never pools connections, for deterministic tests.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
