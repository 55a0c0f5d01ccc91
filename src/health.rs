//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every node concurrently
//! - Join the whole round before reconciling the pool
//!
//! One round is `PROBE_ALL -> JOIN -> RECONCILE -> SLEEP`. The join barrier
//! bounds concurrent probe load to the node count and guarantees rounds
//! never overlap, so reconciliation always sees a complete round. A probe
//! failure is not retried within the round; the node is simply marked down
//! and re-evaluated next round.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::broadcast;
use tokio::time;

use crate::balancer::node::HttpClient;
use crate::balancer::pool::{NodePool, ReconcileSummary};
use crate::config::HealthCheckConfig;
use crate::observability;

pub struct HealthChecker {
    pool: Arc<NodePool>,
    client: HttpClient,
    interval: Duration,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(pool: Arc<NodePool>, config: &HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            pool,
            client,
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Run rounds for the process lifetime, or until the shutdown signal.
    /// The first round fires immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            timeout_secs = self.timeout.as_secs(),
            nodes = self.pool.len(),
            "health checker starting"
        );

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.round().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("health checker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One complete round: fan out one probe task per node, join them all,
    /// then reconcile the pool from the full result set.
    pub async fn round(&self) -> ReconcileSummary {
        let probes: Vec<_> = self
            .pool
            .nodes()
            .iter()
            .map(|node| {
                let node = node.clone();
                let client = self.client.clone();
                let timeout = self.timeout;
                tokio::spawn(async move { node.probe(&client, timeout).await })
            })
            .collect();

        let results: Vec<bool> = join_all(probes)
            .await
            .into_iter()
            // A panicked probe task counts as a failed probe.
            .map(|joined| joined.unwrap_or(false))
            .collect();

        let summary = self.pool.reconcile(&results);

        for (node, &alive) in self.pool.nodes().iter().zip(&results) {
            observability::record_node_health(node.base_url().as_str(), alive);
            tracing::debug!(
                node = %node.base_url(),
                alive,
                requests = node.stats.requests(),
                successes = node.stats.successes(),
                failures = node.stats.failures(),
                "probe finished"
            );
        }
        tracing::info!(
            active_count = summary.active_count,
            ready = summary.ready,
            changed = summary.changed,
            "health round complete"
        );
        summary
    }
}
