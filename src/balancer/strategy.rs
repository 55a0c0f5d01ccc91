//! Node selection strategies.
//!
//! Selection is decoupled from pool state management so the algorithm is
//! swappable and testable in isolation. A strategy runs under the pool lock,
//! so it may read and update the guarded state without further
//! synchronization.

use std::sync::Arc;

use crate::balancer::node::Node;
use crate::balancer::pool::PoolState;
use crate::config::Algorithm;

/// A node selection strategy.
///
/// `select` is called with the pool lock held. It must return the index of
/// an active node (or `None` if there is none) and is responsible for
/// updating the cursor.
pub trait Strategy: Send + Sync {
    fn select(&self, nodes: &[Arc<Node>], state: &mut PoolState) -> Option<usize>;
}

pub fn for_algorithm(algorithm: Algorithm) -> Box<dyn Strategy> {
    match algorithm {
        Algorithm::RoundRobin => Box::new(RoundRobin),
        Algorithm::LeastConnections => Box::new(LeastConnections),
    }
}

/// Pure circular round-robin.
///
/// Starting at `(cursor + 1) % len`, scan forward for at most `len` steps
/// and take the first active node. The scan is bounded by pool size, so it
/// terminates even when every node is down. Selection order is a fixed
/// rotation over the node list, oblivious to load or latency.
#[derive(Debug, Default)]
pub struct RoundRobin;

impl Strategy for RoundRobin {
    fn select(&self, nodes: &[Arc<Node>], state: &mut PoolState) -> Option<usize> {
        let len = nodes.len();
        for step in 1..=len {
            let index = (state.cursor + step) % len;
            if state.active[index] {
                state.cursor = index;
                return Some(index);
            }
        }
        None
    }
}

/// Least connections.
///
/// Picks the active node with the fewest in-flight requests; ties resolve
/// to the lowest index for stability. The in-flight counter is atomic and
/// maintained by an RAII guard held while a request is forwarded, so a read
/// under the pool lock is safe.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl Strategy for LeastConnections {
    fn select(&self, nodes: &[Arc<Node>], state: &mut PoolState) -> Option<usize> {
        let index = (0..nodes.len())
            .filter(|&i| state.active[i])
            .min_by_key(|&i| nodes[i].in_flight())?;
        state.cursor = index;
        Some(index)
    }
}
