//! procflow Duration Estimator
//!
//! Predicts how long a workflow node visit will take from three features:
//! the node (hashed into a small categorical code), the executor, and the
//! hour of day the visit starts.
//!
//! Two models are trained side by side:
//!
//! - **Random forest**: serves every prediction
//! - **Linear regression**: baseline kept for the comparative accuracy report
//!
//! ## Lifecycle
//!
//! An estimator starts untrained and answers every prediction with a fixed
//! default (300 seconds). [`DurationEstimator::train`] refits both models from
//! scratch; with too little history it falls back to a built-in synthetic
//! dataset so the service is usable from an empty database. Once trained it
//! never reverts to untrained.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use procflow_estimator::{DurationEstimator, EstimatorConfig};
//!
//! let estimator = DurationEstimator::new(EstimatorConfig::default());
//! assert_eq!(estimator.predict("Review", Some(1), Utc::now()), 300);
//! ```

pub mod config;
pub mod error;
pub mod estimator;
pub mod features;
pub mod forest;
pub mod linear;
pub mod metrics;

pub use config::EstimatorConfig;
pub use error::TrainingError;
pub use estimator::{DurationEstimator, TrainingReport, TrainingSource};
pub use features::ExecutionSample;
pub use metrics::{EstimatorMetrics, ModelKind, ModelScore};
