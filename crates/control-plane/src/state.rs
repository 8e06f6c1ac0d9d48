//! Application state for the procflow Control Plane server.
//!
//! Holds the services every handler reaches through Axum's `State`.

use std::sync::Arc;
use std::time::Instant;

use procflow_estimator::DurationEstimator;

use crate::clock::SharedClock;
use crate::config::AppConfig;
use crate::services::{
    AuditService, DashboardService, EngineOptions, TemplateService, WorkflowEngine,
};
use crate::store::SharedStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,

    /// Application configuration
    pub config: Arc<AppConfig>,

    pub templates: TemplateService,
    pub engine: WorkflowEngine,
    pub dashboard: DashboardService,
    pub audit: AuditService,

    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Wire the services around one store, estimator and clock.
    pub fn new(
        store: SharedStore,
        estimator: Arc<DurationEstimator>,
        clock: SharedClock,
        config: AppConfig,
    ) -> Self {
        let options = EngineOptions {
            retrain_on_complete: config.retrain_on_complete,
        };
        Self {
            templates: TemplateService::new(store.clone(), clock.clone()),
            engine: WorkflowEngine::new(store.clone(), clock.clone(), estimator, options),
            dashboard: DashboardService::new(store.clone()),
            audit: AuditService::new(store.clone(), clock),
            store,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
