//! ledgerstream: asynchronous transaction processing with real-time
//! notifications.
//!
//! Clients admit transactions over HTTP, a background worker pool processes
//! them from a durable Redis queue, and live observers follow state changes
//! over WebSocket. The subsystems:
//!
//! - [`admission`]: idempotent find-or-create of transactions,
//! - [`dispatch`]: hand-off of transaction ids to the work queue,
//! - [`worker`]: queue consumption, simulated processing and terminal
//!   state transitions,
//! - [`bridge`]: cross-process event hand-off from workers to serving
//!   instances,
//! - [`fanout`]: the in-memory observer registry with pruning delivery.

pub mod admission;
pub mod bridge;
pub mod config;
pub mod context;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod health;
pub mod message;
pub mod metrics;
pub mod model;
pub mod queue;
pub mod routes;
pub mod worker;
