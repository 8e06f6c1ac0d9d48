//! Service layer for the procflow Control Plane.
//!
//! Services hold the workflow rules and sit between the HTTP handlers and
//! the [`WorkflowStore`](crate::store::WorkflowStore).

pub mod audit;
pub mod dashboard;
pub mod engine;
pub mod seed;
pub mod template;
pub mod tracker;
pub mod training;

pub use audit::{AuditAction, AuditService};
pub use dashboard::{AccuracyPoint, DashboardService, DashboardStats};
pub use engine::{EngineOptions, WorkflowEngine};
pub use seed::{DemoSeeder, SeedReport};
pub use template::TemplateService;
pub use tracker::ExecutionTracker;
pub use training::{Retrainer, TrainingFailure};
