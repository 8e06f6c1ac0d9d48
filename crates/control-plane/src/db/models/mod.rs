//! Domain models for the procflow Control Plane.
//!
//! These are the types the store hands out and the API serializes;
//! PostgreSQL row shapes live next to their queries.

pub mod execution;
pub mod instance;
pub mod system_log;
pub mod template;

pub use execution::*;
pub use instance::*;
pub use system_log::*;
pub use template::*;
