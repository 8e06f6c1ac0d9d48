//! Execution tracking: one timed row per node visit.

use procflow_estimator::ExecutionSample;

use crate::clock::SharedClock;
use crate::db::models::{Execution, ExecutionClose, ExecutionStatus, NewExecution};
use crate::error::{AppError, AppResult};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct ExecutionTracker {
    store: SharedStore,
    clock: SharedClock,
}

impl ExecutionTracker {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// A `Running` execution starting now, not yet stored.
    pub fn draft(
        &self,
        node_id: &str,
        executed_by: Option<i64>,
        predicted_duration: i64,
    ) -> NewExecution {
        NewExecution::running(node_id, executed_by, self.clock.now(), predicted_duration)
    }

    /// Completion of `execution` at the current time, for the store to apply
    /// as part of an instance transition.
    pub fn closing(&self, execution: &Execution) -> ExecutionClose {
        ExecutionClose::at(execution, self.clock.now())
    }

    /// Open a `Running` execution. `Conflict` if the instance already has one.
    pub async fn open(
        &self,
        instance_id: i64,
        node_id: &str,
        executed_by: Option<i64>,
        predicted_duration: i64,
    ) -> AppResult<Execution> {
        let draft = self.draft(node_id, executed_by, predicted_duration);
        let execution = self.store.insert_execution(instance_id, draft).await?;
        tracing::debug!(
            instance_id,
            execution_id = execution.id,
            node_id = %execution.node_id,
            predicted_duration,
            "Execution opened"
        );
        Ok(execution)
    }

    /// Complete a running execution, recording its duration in whole seconds.
    pub async fn close(&self, execution_id: i64) -> AppResult<Execution> {
        let not_running =
            || AppError::NotFound(format!("Running execution {} not found", execution_id));

        let execution = self
            .store
            .get_execution(execution_id)
            .await?
            .filter(|e| e.status == ExecutionStatus::Running)
            .ok_or_else(not_running)?;

        let close = self.closing(&execution);
        let closed = self
            .store
            .complete_execution(execution_id, close.end_time, close.actual_duration)
            .await?
            .ok_or_else(not_running)?;

        tracing::debug!(
            instance_id = closed.instance_id,
            execution_id,
            node_id = %closed.node_id,
            actual_duration = close.actual_duration,
            predicted_duration = ?closed.predicted_duration,
            "Execution closed"
        );
        Ok(closed)
    }

    pub async fn running(&self, instance_id: i64) -> AppResult<Option<Execution>> {
        self.store.running_execution(instance_id).await
    }

    /// Completed executions as estimator training rows.
    pub async fn history(&self) -> AppResult<Vec<ExecutionSample>> {
        let completed = self.store.completed_executions().await?;
        Ok(completed.iter().filter_map(Execution::to_sample).collect())
    }
}
