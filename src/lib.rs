//! HTTP load balancer with active health checking.
//!
//! Routes inbound HTTP requests across a statically configured pool of
//! backend nodes, continuously probing node health and excluding unhealthy
//! nodes from selection.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!                    │                 LOAD BALANCER                  │
//!  Client Request    │  ┌─────────┐      ┌───────────────────────┐    │
//!  ──────────────────┼─▶│ gateway │─────▶│ balancer::pool        │    │
//!                    │  └────┬────┘      │  (nodes + cursor +    │    │
//!                    │       │           │   active_count+ready) │    │
//!                    │       ▼           └──────────▲────────────┘    │
//!  Client Response   │  ┌─────────┐                 │ reconcile       │
//!  ◀─────────────────┼──│ forward │      ┌──────────┴────────────┐    │
//!                    │  │ to node │      │ health::HealthChecker │────┼──▶ GET /status
//!                    │  └─────────┘      │  (one round at a time)│    │    on every node
//!                    └────────────────────────────────────────────────┘
//! ```
//!
//! The health checker is the only periodic writer of liveness; the gateway
//! also writes it when a forward fails at the transport layer. Both go
//! through the pool's single mutex, which guards the per-node active flags,
//! the dispatch cursor, the active-node count, and the readiness flag as one
//! consistency unit.

// Core subsystems
pub mod balancer;
pub mod config;
pub mod gateway;
pub mod health;

// Collaborators and cross-cutting concerns
pub mod node_service;
pub mod observability;
pub mod shutdown;

pub use balancer::pool::NodePool;
pub use config::{Algorithm, Config, ConfigError};
pub use gateway::Gateway;
pub use health::HealthChecker;
pub use shutdown::Shutdown;
