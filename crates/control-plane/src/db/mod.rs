//! PostgreSQL access for the procflow Control Plane.
//!
//! Pool setup, schema bootstrap, and per-table query functions used by
//! [`crate::store::PgWorkflowStore`].

pub mod models;
pub mod pool;
pub mod queries;
pub mod schema;

pub use pool::{create_pool, DbPool};
