//! Shared node pool state and dispatch.
//!
//! The per-node liveness flags, the active-node count, the readiness flag,
//! and the dispatch cursor form one consistency unit. A single mutex guards
//! all four; every transition that touches more than one of them holds the
//! lock for the whole transition. Traffic counters stay outside the lock
//! (see [`crate::balancer::node::NodeStats`]).

use std::sync::{Arc, Mutex, MutexGuard};

use url::Url;

use crate::balancer::node::Node;
use crate::balancer::strategy::{self, Strategy};
use crate::config::Algorithm;

/// Mutable pool state guarded by the pool mutex.
pub struct PoolState {
    pub(crate) active: Vec<bool>,
    pub(crate) cursor: usize,
    pub(crate) active_count: usize,
    pub(crate) ready: bool,
}

impl PoolState {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            // Cursor starts on the last slot so the first dispatch lands on
            // index 0.
            cursor: len.saturating_sub(1),
            active: vec![false; len],
            active_count: 0,
            ready: false,
        }
    }

    /// Guarded transition of one node's liveness flag. Idempotent: returns
    /// false if the flag already had the requested value. Flag flip, count
    /// adjustment, and readiness recomputation happen in one critical
    /// section.
    fn transition(&mut self, index: usize, active: bool) -> bool {
        if self.active[index] == active {
            return false;
        }
        self.active[index] = active;
        if active {
            self.active_count += 1;
        } else {
            self.active_count -= 1;
        }
        self.ready = self.active_count > 0;
        true
    }
}

/// Outcome of applying one complete health round.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileSummary {
    pub active_count: usize,
    pub ready: bool,
    /// Number of nodes whose liveness changed this round.
    pub changed: usize,
}

/// The shared pool of backend nodes.
///
/// The node set is fixed at construction; only the guarded state mutates.
pub struct NodePool {
    nodes: Vec<Arc<Node>>,
    strategy: Box<dyn Strategy>,
    state: Mutex<PoolState>,
}

impl NodePool {
    pub fn new(addresses: Vec<Url>, algorithm: Algorithm) -> Self {
        let nodes: Vec<Arc<Node>> = addresses
            .into_iter()
            .map(|url| Arc::new(Node::new(url)))
            .collect();
        let state = Mutex::new(PoolState::new(nodes.len()));
        Self {
            nodes,
            strategy: strategy::for_algorithm(algorithm),
            state,
        }
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // A panicked holder cannot leave the quad half-updated: transition()
        // never unwinds between field writes.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Select the node for the next dispatch.
    ///
    /// Runs under the pool lock; never returns an inactive node and returns
    /// `None` iff no node is active.
    pub fn next_server(&self) -> Option<(usize, Arc<Node>)> {
        let mut state = self.lock();
        let index = self.strategy.select(&self.nodes, &mut state)?;
        Some((index, self.nodes[index].clone()))
    }

    /// Set one node's liveness. Used by the gateway to mark a node down
    /// immediately on a transport failure, without waiting for the next
    /// health round. Returns true if the flag changed.
    pub fn set_active(&self, index: usize, active: bool) -> bool {
        let mut state = self.lock();
        let changed = state.transition(index, active);
        if changed {
            tracing::info!(
                node = %self.nodes[index].base_url(),
                active,
                active_count = state.active_count,
                "node liveness changed"
            );
        }
        changed
    }

    /// Apply one completed round of probe results, one entry per node in
    /// pool order. Every differing node flips inside the same critical
    /// section that adjusts the aggregate count and readiness, so no reader
    /// can observe the count inconsistent with the flags.
    pub fn reconcile(&self, results: &[bool]) -> ReconcileSummary {
        debug_assert_eq!(results.len(), self.nodes.len());
        let mut state = self.lock();
        let mut changed = 0;
        for (index, &alive) in results.iter().enumerate() {
            if state.transition(index, alive) {
                changed += 1;
                tracing::info!(
                    node = %self.nodes[index].base_url(),
                    active = alive,
                    "node liveness changed"
                );
            }
        }
        if !state.ready {
            tracing::warn!("no active nodes, load balancer is not ready");
        }
        ReconcileSummary {
            active_count: state.active_count,
            ready: state.ready,
            changed,
        }
    }

    /// True iff at least one node is active.
    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    pub fn active_count(&self) -> usize {
        self.lock().active_count
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.lock().active[index]
    }
}
