//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (NodePool::next_server, under the pool lock)
//!     → strategy.rs (RoundRobin or LeastConnections picks an index)
//!     → node.rs (the selected node, its counters and probe)
//!
//! Health round
//!     → node.rs (Node::probe, one task per node)
//!     → pool.rs (NodePool::reconcile applies the complete round)
//! ```
//!
//! # Design Decisions
//! - One mutex guards the consistency unit {active flags, cursor,
//!   active_count, ready}; no per-node locks for liveness
//! - Traffic counters are atomics outside the lock (observability only)
//! - Strategies run under the pool lock and may mutate the cursor

pub mod node;
pub mod pool;
pub mod strategy;

pub use node::{HttpClient, Node};
pub use pool::NodePool;
pub use strategy::Strategy;
