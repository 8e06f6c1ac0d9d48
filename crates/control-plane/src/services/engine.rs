//! Instance state machine.
//!
//! An instance walks its template's nodes in order. Each node visit is an
//! execution with a predicted duration; completing a node closes that
//! execution, feeds the history back to the estimator, and either opens the
//! next node or finishes the instance.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use procflow_estimator::{DurationEstimator, EstimatorMetrics};
use tokio::sync::Mutex;

use crate::clock::SharedClock;
use crate::db::models::{
    Execution, ExecutionClose, Instance, InstanceStatus, InstanceView, NewInstance, Template,
    Transition,
};
use crate::error::{AppError, AppResult};
use crate::result_ext::OptionExt;
use crate::services::tracker::ExecutionTracker;
use crate::services::training::Retrainer;
use crate::store::SharedStore;

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Schedule a background retrain after each completed node
    pub retrain_on_complete: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            retrain_on_complete: true,
        }
    }
}

#[derive(Clone)]
pub struct WorkflowEngine {
    store: SharedStore,
    clock: SharedClock,
    estimator: Arc<DurationEstimator>,
    tracker: ExecutionTracker,
    retrainer: Retrainer,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    options: EngineOptions,
}

impl WorkflowEngine {
    pub fn new(
        store: SharedStore,
        clock: SharedClock,
        estimator: Arc<DurationEstimator>,
        options: EngineOptions,
    ) -> Self {
        let tracker = ExecutionTracker::new(store.clone(), clock.clone());
        let retrainer = Retrainer::new(estimator.clone(), tracker.clone());
        Self {
            store,
            clock,
            estimator,
            tracker,
            retrainer,
            locks: Arc::new(DashMap::new()),
            options,
        }
    }

    pub fn estimator(&self) -> &Arc<DurationEstimator> {
        &self.estimator
    }

    pub fn retrainer(&self) -> &Retrainer {
        &self.retrainer
    }

    /// Start an instance at the template's first node.
    ///
    /// The instance and its first execution are written together.
    pub async fn start(&self, template_id: i64, actor_id: Option<i64>) -> AppResult<InstanceView> {
        let template = self
            .store
            .get_template(template_id)
            .await?
            .filter(|t| !t.is_deleted)
            .ok_or_else(|| AppError::NotFound(format!("Template {} not found", template_id)))?;

        let first = template.first_node().ok_or_else(|| {
            AppError::Validation(format!("Template {} has no nodes", template_id))
        })?;

        let now = self.clock.now();
        let predicted = self.estimator.predict(&first.id, actor_id, now);
        let (instance, executions) = self
            .store
            .create_instance(
                NewInstance::running(template.id, first.id.as_str(), now),
                vec![self.tracker.draft(&first.id, actor_id, predicted)],
            )
            .await?;

        tracing::info!(
            instance_id = instance.id,
            template_id,
            node_id = %first.id,
            predicted_duration = predicted,
            "Instance started"
        );
        Ok(InstanceView {
            instance,
            executions,
        })
    }

    /// Complete the current node and move on.
    ///
    /// The next node is found by looking the current node id up in the
    /// template as it is now. If the id is last, no longer present, or the
    /// template row is gone, the instance completes. Closing the running
    /// execution, moving the instance and opening the next execution are
    /// saved as one transition; a retrain is scheduled only once it is stored.
    pub async fn advance(&self, instance_id: i64, actor_id: Option<i64>) -> AppResult<Instance> {
        let template_id = self.load_instance(instance_id).await?.template_id;
        let template = self
            .store
            .get_template(template_id)
            .await?
            .log_none(format_args!("template {} of instance {}", template_id, instance_id));

        let result = {
            let lock = self.lock_for(instance_id);
            let _guard = lock.lock().await;
            self.advance_locked(instance_id, actor_id, template.as_ref()).await
        };
        self.release_lock(instance_id);

        let (instance, transition) = result?;
        if transition.closed.is_some() && self.options.retrain_on_complete {
            self.retrainer.schedule();
        }
        Ok(instance)
    }

    /// Abort a running instance. No retrain is scheduled.
    pub async fn terminate(&self, instance_id: i64, actor_id: Option<i64>) -> AppResult<Instance> {
        self.load_instance(instance_id).await?;

        let result = {
            let lock = self.lock_for(instance_id);
            let _guard = lock.lock().await;
            self.terminate_locked(instance_id).await
        };
        self.release_lock(instance_id);

        let instance = result?;
        tracing::info!(instance_id, actor_id = ?actor_id, "Instance terminated");
        Ok(instance)
    }

    async fn advance_locked(
        &self,
        instance_id: i64,
        actor_id: Option<i64>,
        template: Option<&Template>,
    ) -> AppResult<(Instance, Transition)> {
        let mut instance = self.load_running(instance_id).await?;
        let close = self.pending_close(instance_id).await?;

        match next_node(template, &instance) {
            Some(node_id) => {
                let predicted = self.estimator.predict(&node_id, actor_id, self.clock.now());
                instance.move_to(&node_id);
                let draft = self.tracker.draft(&node_id, actor_id, predicted);
                let transition = self
                    .store
                    .save_transition(&instance, close, Some(draft))
                    .await?;
                tracing::info!(
                    instance_id,
                    node_id = %node_id,
                    predicted_duration = predicted,
                    "Instance advanced"
                );
                Ok((instance, transition))
            }
            None => {
                instance.finish(InstanceStatus::Completed, self.clock.now());
                let transition = self.store.save_transition(&instance, close, None).await?;
                tracing::info!(instance_id, "Instance completed");
                Ok((instance, transition))
            }
        }
    }

    async fn terminate_locked(&self, instance_id: i64) -> AppResult<Instance> {
        let mut instance = self.load_running(instance_id).await?;
        let close = self.pending_close(instance_id).await?;
        instance.finish(InstanceStatus::Terminated, self.clock.now());
        self.store.save_transition(&instance, close, None).await?;
        Ok(instance)
    }

    pub async fn get(&self, instance_id: i64) -> AppResult<InstanceView> {
        let instance = self.load_instance(instance_id).await?;
        let executions = self.store.executions_for(&[instance_id]).await?;
        Ok(InstanceView {
            instance,
            executions,
        })
    }

    /// All instances with their executions, in id order.
    pub async fn list(&self) -> AppResult<Vec<InstanceView>> {
        let instances = self.store.list_instances().await?;
        let ids: Vec<i64> = instances.iter().map(|i| i.id).collect();

        let mut by_instance: HashMap<i64, Vec<Execution>> = HashMap::new();
        for execution in self.store.executions_for(&ids).await? {
            by_instance
                .entry(execution.instance_id)
                .or_default()
                .push(execution);
        }

        Ok(instances
            .into_iter()
            .map(|instance| InstanceView {
                executions: by_instance.remove(&instance.id).unwrap_or_default(),
                instance,
            })
            .collect())
    }

    /// Estimator metrics, training first if no model exists yet.
    pub async fn benchmarks(&self) -> EstimatorMetrics {
        self.retrainer.ensure_trained().await;
        self.estimator.metrics()
    }

    async fn load_instance(&self, instance_id: i64) -> AppResult<Instance> {
        self.store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Instance {} not found", instance_id)))
    }

    async fn load_running(&self, instance_id: i64) -> AppResult<Instance> {
        let instance = self.load_instance(instance_id).await?;
        if !instance.is_running() {
            return Err(AppError::Conflict(format!(
                "Instance {} is {}",
                instance_id, instance.status
            )));
        }
        Ok(instance)
    }

    async fn pending_close(&self, instance_id: i64) -> AppResult<Option<ExecutionClose>> {
        let running = self.tracker.running(instance_id).await?;
        Ok(running.map(|execution| self.tracker.closing(&execution)))
    }

    fn lock_for(&self, instance_id: i64) -> Arc<Mutex<()>> {
        self.locks.entry(instance_id).or_default().clone()
    }

    /// Drop the instance's lock entry unless another caller still holds or
    /// waits on it. Call only after this caller's own handle is gone.
    fn release_lock(&self, instance_id: i64) {
        self.locks.remove_if(&instance_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Node following the instance's current node in `template`.
fn next_node(template: Option<&Template>, instance: &Instance) -> Option<String> {
    let current = instance.current_node_id.as_deref()?;
    template?.node_after(current).map(|node| node.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::db::models::{
        ExecutionStatus, InstanceCounts, NewExecution, NewSystemLog, SystemLog, TemplateNode,
        TemplateRequest,
    };
    use crate::services::template::TemplateService;
    use crate::store::{MemoryWorkflowStore, WorkflowStore};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio_test::assert_ok;

    struct Harness {
        engine: WorkflowEngine,
        templates: TemplateService,
        store: SharedStore,
        clock: Arc<ManualClock>,
    }

    fn harness(retrain_on_complete: bool) -> Harness {
        harness_with(Arc::new(MemoryWorkflowStore::new()), retrain_on_complete)
    }

    fn harness_with(store: SharedStore, retrain_on_complete: bool) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap(),
        ));
        let engine = WorkflowEngine::new(
            store.clone(),
            clock.clone(),
            Arc::new(DurationEstimator::default()),
            EngineOptions {
                retrain_on_complete,
            },
        );
        let templates = TemplateService::new(store.clone(), clock.clone());
        Harness {
            engine,
            templates,
            store,
            clock,
        }
    }

    async fn template(h: &Harness, ids: &[&str]) -> Template {
        h.templates
            .create(TemplateRequest::new("Flow", ids.iter().copied()))
            .await
            .unwrap()
    }

    fn running_count(view: &InstanceView) -> usize {
        view.executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Running)
            .count()
    }

    #[tokio::test]
    async fn test_linear_walk_through_three_nodes() {
        let h = harness(false);
        let t = template(&h, &["A", "B", "End"]).await;

        let started = h.engine.start(t.id, Some(1)).await.unwrap();
        let id = started.instance.id;
        assert_eq!(started.instance.current_node_id.as_deref(), Some("A"));
        assert_eq!(started.executions.len(), 1);
        assert_eq!(started.executions[0].node_id, "A");
        assert_eq!(started.executions[0].status, ExecutionStatus::Running);
        assert_eq!(started.executions[0].predicted_duration, Some(300));

        h.clock.advance(Duration::seconds(45));
        let at_b = h.engine.advance(id, Some(1)).await.unwrap();
        assert_eq!(at_b.current_node_id.as_deref(), Some("B"));
        let view = h.engine.get(id).await.unwrap();
        let a = &view.executions[0];
        assert_eq!(a.status, ExecutionStatus::Completed);
        assert_eq!(a.actual_duration, Some(45));
        assert_eq!(running_count(&view), 1);

        let at_end = h.engine.advance(id, Some(1)).await.unwrap();
        assert_eq!(at_end.current_node_id.as_deref(), Some("End"));
        assert_eq!(at_end.status, InstanceStatus::Running);

        let done = h.engine.advance(id, Some(1)).await.unwrap();
        assert_eq!(done.status, InstanceStatus::Completed);
        assert!(done.current_node_id.is_none());
        assert_eq!(done.end_time, Some(h.clock.now()));

        let view = h.engine.get(id).await.unwrap();
        assert_eq!(view.executions.len(), 3);
        assert_eq!(running_count(&view), 0);
        assert!(view
            .executions
            .iter()
            .all(|e| e.actual_duration.unwrap_or(-1) >= 0));

        let again = h.engine.advance(id, Some(1)).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_advance_unknown_instance_has_no_side_effects() {
        let h = harness(true);
        let result = h.engine.advance(404, None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(h.store.count_instances().await.unwrap().total, 0);
        assert!(h.store.completed_executions().await.unwrap().is_empty());
        assert!(h.engine.locks.is_empty());
        assert!(!h.engine.estimator().is_trained());
    }

    #[tokio::test]
    async fn test_start_rejects_missing_and_deleted_templates() {
        let h = harness(false);
        assert!(matches!(
            h.engine.start(1, None).await,
            Err(AppError::NotFound(_))
        ));

        let t = template(&h, &["A"]).await;
        h.templates.delete(t.id).await.unwrap();
        assert!(matches!(
            h.engine.start(t.id, None).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(h.store.count_instances().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_single_node_template_completes_on_first_advance() {
        let h = harness(false);
        let t = template(&h, &["Only"]).await;
        let started = h.engine.start(t.id, None).await.unwrap();
        let done = h.engine.advance(started.instance.id, None).await.unwrap();
        assert_eq!(done.status, InstanceStatus::Completed);
    }

    #[tokio::test]
    async fn test_template_drift_completes_when_node_removed() {
        let h = harness(false);
        let t = template(&h, &["A", "B", "C"]).await;
        let id = h.engine.start(t.id, None).await.unwrap().instance.id;
        h.engine.advance(id, None).await.unwrap();

        // B disappears from the template while the instance sits on it
        h.templates
            .update(t.id, TemplateRequest::new("Flow", ["A", "C"]))
            .await
            .unwrap();
        let done = h.engine.advance(id, None).await.unwrap();
        assert_eq!(done.status, InstanceStatus::Completed);
    }

    #[tokio::test]
    async fn test_template_drift_follows_new_order() {
        let h = harness(false);
        let t = template(&h, &["A", "B"]).await;
        let id = h.engine.start(t.id, None).await.unwrap().instance.id;
        h.templates
            .update(t.id, TemplateRequest::new("Flow", ["A", "Review", "B"]))
            .await
            .unwrap();
        let moved = h.engine.advance(id, None).await.unwrap();
        assert_eq!(moved.current_node_id.as_deref(), Some("Review"));
    }

    #[tokio::test]
    async fn test_advance_after_template_soft_delete_still_walks() {
        let h = harness(false);
        let t = template(&h, &["A", "B"]).await;
        let id = h.engine.start(t.id, None).await.unwrap().instance.id;
        h.templates.delete(t.id).await.unwrap();
        let moved = h.engine.advance(id, None).await.unwrap();
        assert_eq!(moved.current_node_id.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_terminate_closes_running_execution() {
        let h = harness(true);
        let t = template(&h, &["A", "B"]).await;
        let id = h.engine.start(t.id, Some(2)).await.unwrap().instance.id;
        h.clock.advance(Duration::seconds(10));

        let terminated = h.engine.terminate(id, Some(2)).await.unwrap();
        assert_eq!(terminated.status, InstanceStatus::Terminated);
        assert!(terminated.current_node_id.is_none());
        assert!(terminated.end_time.is_some());

        let view = h.engine.get(id).await.unwrap();
        assert_eq!(running_count(&view), 0);
        assert_eq!(view.executions[0].actual_duration, Some(10));
        assert!(!h.engine.estimator().is_trained());

        assert!(matches!(
            h.engine.terminate(id, Some(2)).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            h.engine.advance(id, Some(2)).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_advances_keep_one_running_execution() {
        let h = harness(false);
        let t = template(&h, &["A", "B", "C", "D", "E", "F"]).await;
        let id = h.engine.start(t.id, None).await.unwrap().instance.id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = h.engine.clone();
            handles.push(tokio::spawn(async move { engine.advance(id, None).await }));
        }
        let mut completed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(instance) if instance.status == InstanceStatus::Completed => completed += 1,
                Ok(_) => {}
                Err(AppError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(completed, 1);

        let view = h.engine.get(id).await.unwrap();
        assert_eq!(view.instance.status, InstanceStatus::Completed);
        assert_eq!(view.executions.len(), 6);
        assert_eq!(running_count(&view), 0);
    }

    #[tokio::test]
    async fn test_completion_schedules_retrain() {
        let h = harness(true);
        let t = template(&h, &["A", "B"]).await;
        let id = h.engine.start(t.id, None).await.unwrap().instance.id;
        assert_ok!(h.engine.advance(id, None).await);

        for _ in 0..100 {
            if h.engine.estimator().is_trained() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(h.engine.estimator().is_trained());
    }

    #[tokio::test]
    async fn test_list_groups_executions() {
        let h = harness(false);
        let t = template(&h, &["A", "B"]).await;
        let first = h.engine.start(t.id, None).await.unwrap().instance.id;
        let second = h.engine.start(t.id, None).await.unwrap().instance.id;
        h.engine.advance(first, None).await.unwrap();

        let views = h.engine.list().await.unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].instance.id, first);
        assert_eq!(views[0].executions.len(), 2);
        assert_eq!(views[1].instance.id, second);
        assert_eq!(views[1].executions.len(), 1);
    }

    #[tokio::test]
    async fn test_benchmarks_train_lazily() {
        let h = harness(false);
        let metrics = h.engine.benchmarks().await;
        assert!(metrics.trained);
        assert_eq!(metrics.random_forest.mse, 120.5);
        assert_eq!(metrics.linear_regression.r2, 0.65);
    }

    #[tokio::test]
    async fn test_lock_entries_released_after_rejected_calls() {
        let h = harness(false);
        let t = template(&h, &["Only"]).await;
        let mut ids = Vec::new();
        for _ in 0..5 {
            let id = h.engine.start(t.id, None).await.unwrap().instance.id;
            h.engine.advance(id, None).await.unwrap();
            ids.push(id);
        }
        assert!(h.engine.locks.is_empty());

        for id in ids {
            assert!(matches!(
                h.engine.advance(id, None).await,
                Err(AppError::Conflict(_))
            ));
            assert!(matches!(
                h.engine.terminate(id, None).await,
                Err(AppError::Conflict(_))
            ));
        }
        assert!(h.engine.locks.is_empty());
    }

    #[tokio::test]
    async fn test_lock_entry_released_between_advances() {
        let h = harness(false);
        let t = template(&h, &["A", "B", "C"]).await;
        let id = h.engine.start(t.id, None).await.unwrap().instance.id;
        h.engine.advance(id, None).await.unwrap();
        assert_eq!(h.engine.locks.len(), 0);
    }

    /// Memory store whose transitions can be switched to fail.
    #[derive(Default)]
    struct FailingTransitions {
        inner: MemoryWorkflowStore,
        fail: AtomicBool,
    }

    #[async_trait]
    impl WorkflowStore for FailingTransitions {
        fn backend(&self) -> &'static str {
            "failing"
        }

        async fn initialize(&self) -> AppResult<()> {
            self.inner.initialize().await
        }

        async fn ping(&self) -> bool {
            self.inner.ping().await
        }

        async fn insert_template(
            &self,
            name: &str,
            nodes: &[TemplateNode],
            created_at: chrono::DateTime<Utc>,
        ) -> AppResult<Template> {
            self.inner.insert_template(name, nodes, created_at).await
        }

        async fn get_template(&self, id: i64) -> AppResult<Option<Template>> {
            self.inner.get_template(id).await
        }

        async fn find_template_by_name(&self, name: &str) -> AppResult<Option<Template>> {
            self.inner.find_template_by_name(name).await
        }

        async fn update_template(
            &self,
            id: i64,
            name: &str,
            nodes: &[TemplateNode],
        ) -> AppResult<Option<Template>> {
            self.inner.update_template(id, name, nodes).await
        }

        async fn soft_delete_template(&self, id: i64) -> AppResult<bool> {
            self.inner.soft_delete_template(id).await
        }

        async fn list_templates(&self) -> AppResult<Vec<Template>> {
            self.inner.list_templates().await
        }

        async fn create_instance(
            &self,
            instance: NewInstance,
            executions: Vec<NewExecution>,
        ) -> AppResult<(Instance, Vec<Execution>)> {
            self.inner.create_instance(instance, executions).await
        }

        async fn get_instance(&self, id: i64) -> AppResult<Option<Instance>> {
            self.inner.get_instance(id).await
        }

        async fn list_instances(&self) -> AppResult<Vec<Instance>> {
            self.inner.list_instances().await
        }

        async fn save_transition(
            &self,
            instance: &Instance,
            close: Option<ExecutionClose>,
            next: Option<NewExecution>,
        ) -> AppResult<Transition> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Internal("connection reset".to_string()));
            }
            self.inner.save_transition(instance, close, next).await
        }

        async fn count_instances(&self) -> AppResult<InstanceCounts> {
            self.inner.count_instances().await
        }

        async fn insert_execution(
            &self,
            instance_id: i64,
            execution: NewExecution,
        ) -> AppResult<Execution> {
            self.inner.insert_execution(instance_id, execution).await
        }

        async fn get_execution(&self, id: i64) -> AppResult<Option<Execution>> {
            self.inner.get_execution(id).await
        }

        async fn running_execution(&self, instance_id: i64) -> AppResult<Option<Execution>> {
            self.inner.running_execution(instance_id).await
        }

        async fn complete_execution(
            &self,
            id: i64,
            end_time: chrono::DateTime<Utc>,
            actual_duration: i64,
        ) -> AppResult<Option<Execution>> {
            self.inner.complete_execution(id, end_time, actual_duration).await
        }

        async fn executions_for(&self, instance_ids: &[i64]) -> AppResult<Vec<Execution>> {
            self.inner.executions_for(instance_ids).await
        }

        async fn completed_executions(&self) -> AppResult<Vec<Execution>> {
            self.inner.completed_executions().await
        }

        async fn append_log(&self, entry: NewSystemLog) -> AppResult<SystemLog> {
            self.inner.append_log(entry).await
        }

        async fn recent_logs(&self, limit: i64) -> AppResult<Vec<SystemLog>> {
            self.inner.recent_logs(limit).await
        }
    }

    #[tokio::test]
    async fn test_failed_transition_leaves_node_running() {
        let store = Arc::new(FailingTransitions::default());
        let h = harness_with(store.clone(), true);
        let t = template(&h, &["A", "B"]).await;
        let id = h.engine.start(t.id, None).await.unwrap().instance.id;
        h.clock.advance(Duration::seconds(30));

        store.fail.store(true, Ordering::SeqCst);
        let result = h.engine.advance(id, None).await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        let view = h.engine.get(id).await.unwrap();
        assert_eq!(view.instance.current_node_id.as_deref(), Some("A"));
        assert_eq!(view.executions.len(), 1);
        assert_eq!(view.executions[0].status, ExecutionStatus::Running);
        assert!(view.executions[0].actual_duration.is_none());
        assert!(h.engine.locks.is_empty());

        // No retrain was scheduled for the rejected transition
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!h.engine.estimator().is_trained());

        store.fail.store(false, Ordering::SeqCst);
        let moved = h.engine.advance(id, None).await.unwrap();
        assert_eq!(moved.current_node_id.as_deref(), Some("B"));
        let view = h.engine.get(id).await.unwrap();
        assert_eq!(view.executions[0].actual_duration, Some(30));
        assert_eq!(running_count(&view), 1);
    }
}
