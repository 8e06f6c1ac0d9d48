//! procflow Control Plane Library
//!
//! This crate provides the control plane server for procflow, handling:
//!
//! - **Template Management**: Versioned, soft-deletable ordered node lists
//! - **Instance Execution**: Walking instances through their template's nodes
//! - **Execution Tracking**: Timed records of every node visit
//! - **Duration Estimation**: Predictions from [`procflow_estimator`], retrained
//!   in the background as executions complete
//! - **Audit Logging**: A trail of every state-changing API call
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`db`]: PostgreSQL pool, schema, models and queries
//! - [`store`]: The [`store::WorkflowStore`] trait and its backends
//! - [`services`]: Workflow engine, templates, tracker, retraining, dashboard
//! - [`handlers`] / [`router`]: HTTP surface
//! - [`state`]: Shared application state
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use procflow_control_plane::{
//!     clock::SystemClock, config::AppConfig, router::build_router, state::AppState,
//!     store::MemoryWorkflowStore,
//! };
//! use procflow_estimator::DurationEstimator;
//!
//! let state = AppState::new(
//!     Arc::new(MemoryWorkflowStore::new()),
//!     Arc::new(DurationEstimator::default()),
//!     Arc::new(SystemClock),
//!     AppConfig::default(),
//! );
//! let app = build_router(state);
//! ```

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod result_ext;
pub mod router;
pub mod services;
pub mod state;
pub mod store;

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;
