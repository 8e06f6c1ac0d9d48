//! Configuration module for the procflow Control Plane server.
//!
//! Settings are read from environment variables with `envy`; each struct
//! falls back to its `Default` when parsing fails.

mod app;
mod database;
mod estimator;

pub use app::{AppConfig, StoreBackend};
pub use database::DatabaseConfig;
pub use estimator::estimator_config_from_env;
