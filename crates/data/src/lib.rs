//! Persistence and external providers for the rebalancer.
//!
//! - Postgres repositories for commissions, position state, decision
//!   history and market snapshots
//! - `PgStore` and `InMemoryStore` implementing the store ports
//! - An HTTP, model-backed bias oracle

/// In-memory store.
pub mod memory;
/// External providers.
pub mod providers;
/// Database repositories.
pub mod repositories;
/// Postgres-backed store.
pub mod store;

pub use memory::InMemoryStore;
pub use providers::{HttpBiasOracle, HttpOracleConfig};
pub use repositories::Database;
pub use store::PgStore;
