//! Dashboard aggregates.

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::store::SharedStore;

/// Predicted vs. actual duration of one completed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyPoint {
    pub id: i64,
    pub actual: i64,
    pub predicted: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_instances: i64,
    pub active_instances: i64,
    pub accuracy_data: Vec<AccuracyPoint>,
}

#[derive(Clone)]
pub struct DashboardService {
    store: SharedStore,
}

impl DashboardService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn stats(&self) -> AppResult<DashboardStats> {
        let counts = self.store.count_instances().await?;
        let accuracy_data = self
            .store
            .completed_executions()
            .await?
            .into_iter()
            .filter_map(|e| {
                e.actual_duration.map(|actual| AccuracyPoint {
                    id: e.id,
                    actual,
                    predicted: e.predicted_duration,
                })
            })
            .collect();

        Ok(DashboardStats {
            total_instances: counts.total,
            active_instances: counts.active,
            accuracy_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::models::TemplateRequest;
    use crate::services::{EngineOptions, TemplateService, WorkflowEngine};
    use crate::store::MemoryWorkflowStore;
    use chrono::{Duration, Utc};
    use procflow_estimator::DurationEstimator;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stats_counts_and_accuracy() {
        let store: SharedStore = Arc::new(MemoryWorkflowStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let templates = TemplateService::new(store.clone(), clock.clone());
        let engine = WorkflowEngine::new(
            store.clone(),
            clock.clone(),
            Arc::new(DurationEstimator::default()),
            EngineOptions {
                retrain_on_complete: false,
            },
        );
        let t = templates
            .create(TemplateRequest::new("Flow", ["A", "B"]))
            .await
            .unwrap();
        let first = engine.start(t.id, None).await.unwrap().instance.id;
        engine.start(t.id, None).await.unwrap();
        clock.advance(Duration::seconds(60));
        engine.advance(first, None).await.unwrap();
        engine.advance(first, None).await.unwrap();

        let stats = DashboardService::new(store).stats().await.unwrap();
        assert_eq!(stats.total_instances, 2);
        assert_eq!(stats.active_instances, 1);
        assert_eq!(stats.accuracy_data.len(), 2);
        assert_eq!(stats.accuracy_data[0].actual, 60);
        assert_eq!(stats.accuracy_data[0].predicted, Some(300));
    }
}
