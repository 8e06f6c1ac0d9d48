//! Demo data: three templates plus a history of finished and running
//! instances, so the dashboard and estimator have something to show.

use chrono::Duration;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::clock::SharedClock;
use crate::db::models::{
    ExecutionStatus, InstanceStatus, NewExecution, NewInstance, Template, TemplateNode,
};
use crate::error::{AppError, AppResult};
use crate::services::training::Retrainer;
use crate::store::SharedStore;

const COMPLETED_INSTANCES: usize = 15;
const RUNNING_INSTANCES: usize = 5;

/// Executor recorded on seeded executions.
const DEMO_EXECUTOR: i64 = 1;

const DEMO_TEMPLATES: [(&str, &[&str]); 3] = [
    (
        "采购审批流程 (Purchase Approval)",
        &[
            "开始节点 (Start)",
            "部门经理审批 (Manager Approval)",
            "财务审核 (Finance Review)",
            "总经理批准 (GM Approval)",
            "结束 (End)",
        ],
    ),
    (
        "员工请假流程 (Leave Application)",
        &[
            "提交申请 (Submit)",
            "直属主管审批 (Supervisor Approval)",
            "人事备案 (HR Filing)",
            "结束 (End)",
        ],
    ),
    (
        "合同签署流程 (Contract Signing)",
        &[
            "起草合同 (Draft)",
            "法务审核 (Legal Review)",
            "财务确认 (Finance Check)",
            "签署归档 (Sign & Archive)",
            "结束 (End)",
        ],
    ),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub templates_created: usize,
    pub instances_created: usize,
}

pub struct DemoSeeder {
    store: SharedStore,
    clock: SharedClock,
    retrainer: Retrainer,
    rng: StdRng,
}

impl DemoSeeder {
    pub fn new(store: SharedStore, clock: SharedClock, retrainer: Retrainer) -> Self {
        Self {
            store,
            clock,
            retrainer,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fix the random source, for reproducible demo data.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Create missing demo templates, then add demo instances when the store
    /// has none, then train the estimator on the result.
    pub async fn seed(&mut self) -> AppResult<SeedReport> {
        let mut report = SeedReport::default();
        let mut templates = Vec::with_capacity(DEMO_TEMPLATES.len());

        for (name, node_ids) in DEMO_TEMPLATES {
            match self.store.find_template_by_name(name).await? {
                Some(existing) => {
                    tracing::debug!(template_id = existing.id, name, "Demo template exists");
                    templates.push(existing);
                }
                None => {
                    let nodes: Vec<TemplateNode> =
                        node_ids.iter().map(|id| TemplateNode::new(*id)).collect();
                    let created = self
                        .store
                        .insert_template(name, &nodes, self.clock.now())
                        .await?;
                    tracing::info!(template_id = created.id, name, "Demo template created");
                    report.templates_created += 1;
                    templates.push(created);
                }
            }
        }

        if self.store.count_instances().await?.total > 0 {
            tracing::info!("Instances already present, skipping demo history");
        } else {
            for _ in 0..COMPLETED_INSTANCES {
                let template = self.pick(&templates)?;
                self.seed_completed(&template).await?;
                report.instances_created += 1;
            }
            for _ in 0..RUNNING_INSTANCES {
                let template = self.pick(&templates)?;
                self.seed_running(&template).await?;
                report.instances_created += 1;
            }
        }

        if let Err(e) = self.retrainer.train_once().await {
            tracing::warn!(error = %e, "Training after demo seeding failed");
        }

        tracing::info!(
            templates_created = report.templates_created,
            instances_created = report.instances_created,
            "Demo data seeded"
        );
        Ok(report)
    }

    fn pick(&mut self, templates: &[Template]) -> AppResult<Template> {
        templates
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| AppError::Internal("No demo templates available".to_string()))
    }

    async fn seed_completed(&mut self, template: &Template) -> AppResult<()> {
        let start = self.clock.now() - Duration::days(self.rng.gen_range(1..=10));
        let mut cursor = start;
        let mut executions = Vec::with_capacity(template.nodes.len());

        for node in &template.nodes {
            let actual: i64 = self.rng.gen_range(300..=3600);
            let mut predicted = actual + self.rng.gen_range(-600..=600);
            if predicted < 0 {
                predicted = 300;
            }
            let end = cursor + Duration::seconds(actual);
            executions.push(NewExecution {
                node_id: node.id.clone(),
                executed_by: Some(DEMO_EXECUTOR),
                status: ExecutionStatus::Completed,
                start_time: cursor,
                end_time: Some(end),
                predicted_duration: Some(predicted),
                actual_duration: Some(actual),
            });
            cursor = end + Duration::seconds(60);
        }

        let instance = NewInstance {
            template_id: template.id,
            current_node_id: None,
            status: InstanceStatus::Completed,
            start_time: start,
            end_time: Some(cursor),
        };
        self.store.create_instance(instance, executions).await?;
        Ok(())
    }

    async fn seed_running(&mut self, template: &Template) -> AppResult<()> {
        // Never park a demo instance on the last node
        let last_allowed = template.nodes.len().saturating_sub(2);
        let node = &template.nodes[self.rng.gen_range(0..=last_allowed)];

        let now = self.clock.now();
        let start = now - Duration::hours(self.rng.gen_range(0..=5));
        let entered = now - Duration::minutes(self.rng.gen_range(5..=30));
        let predicted: i64 = self.rng.gen_range(600..=3000);

        self.store
            .create_instance(
                NewInstance::running(template.id, node.id.as_str(), start),
                vec![NewExecution::running(
                    node.id.as_str(),
                    Some(DEMO_EXECUTOR),
                    entered,
                    predicted,
                )],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::services::tracker::ExecutionTracker;
    use crate::store::MemoryWorkflowStore;
    use procflow_estimator::DurationEstimator;
    use std::sync::Arc;

    fn seeder(store: SharedStore) -> DemoSeeder {
        let clock: SharedClock = Arc::new(SystemClock);
        let tracker = ExecutionTracker::new(store.clone(), clock.clone());
        let retrainer = Retrainer::new(Arc::new(DurationEstimator::default()), tracker);
        DemoSeeder::new(store, clock, retrainer).with_seed(7)
    }

    #[tokio::test]
    async fn test_seed_populates_history() {
        let store: SharedStore = Arc::new(MemoryWorkflowStore::new());
        let mut seeder = seeder(store.clone());
        let report = seeder.seed().await.unwrap();

        assert_eq!(report.templates_created, 3);
        assert_eq!(report.instances_created, 20);

        let counts = store.count_instances().await.unwrap();
        assert_eq!(counts.total, 20);
        assert_eq!(counts.active, 5);

        let completed = store.completed_executions().await.unwrap();
        assert!(completed.len() >= 15 * 4);
        for execution in &completed {
            let actual = execution.actual_duration.unwrap();
            assert!((300..=3600).contains(&actual));
            let predicted = execution.predicted_duration.unwrap();
            assert!(predicted >= 0);
            assert!((predicted - actual).abs() <= 600 || predicted == 300);
        }

        for instance in store.list_instances().await.unwrap() {
            let running = store.running_execution(instance.id).await.unwrap();
            assert_eq!(instance.is_running(), running.is_some());
            assert_eq!(instance.is_running(), instance.current_node_id.is_some());
        }
        assert!(seeder.retrainer.estimator().is_trained());
    }

    #[tokio::test]
    async fn test_seed_twice_adds_nothing() {
        let store: SharedStore = Arc::new(MemoryWorkflowStore::new());
        seeder(store.clone()).seed().await.unwrap();
        let report = seeder(store.clone()).seed().await.unwrap();
        assert_eq!(report, SeedReport::default());
        assert_eq!(store.list_templates().await.unwrap().len(), 3);
        assert_eq!(store.count_instances().await.unwrap().total, 20);
    }
}
