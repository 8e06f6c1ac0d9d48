//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::WorkflowStore;
use crate::db::models::{
    Execution, ExecutionClose, Instance, InstanceCounts, NewExecution, NewInstance, NewSystemLog,
    SystemLog, Template, TemplateNode, Transition,
};
use crate::db::pool;
use crate::db::queries::{
    execution as executions, instance as instances, system_log as logs, template as templates,
};
use crate::db::{schema, DbPool};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: DbPool,
}

impl PgWorkflowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn initialize(&self) -> AppResult<()> {
        schema::apply_schema(&self.pool).await
    }

    async fn ping(&self) -> bool {
        pool::ping(&self.pool).await
    }

    async fn insert_template(
        &self,
        name: &str,
        nodes: &[TemplateNode],
        created_at: DateTime<Utc>,
    ) -> AppResult<Template> {
        templates::insert_template(&self.pool, name, nodes, created_at).await
    }

    async fn get_template(&self, id: i64) -> AppResult<Option<Template>> {
        templates::get_template(&self.pool, id).await
    }

    async fn find_template_by_name(&self, name: &str) -> AppResult<Option<Template>> {
        templates::find_template_by_name(&self.pool, name).await
    }

    async fn update_template(
        &self,
        id: i64,
        name: &str,
        nodes: &[TemplateNode],
    ) -> AppResult<Option<Template>> {
        templates::update_template(&self.pool, id, name, nodes).await
    }

    async fn soft_delete_template(&self, id: i64) -> AppResult<bool> {
        templates::soft_delete_template(&self.pool, id).await
    }

    async fn list_templates(&self) -> AppResult<Vec<Template>> {
        templates::list_templates(&self.pool).await
    }

    async fn create_instance(
        &self,
        instance: NewInstance,
        new_executions: Vec<NewExecution>,
    ) -> AppResult<(Instance, Vec<Execution>)> {
        let mut tx = self.pool.begin().await?;

        let instance = instances::insert_instance(&mut *tx, &instance).await?;
        let mut stored = Vec::with_capacity(new_executions.len());
        for execution in &new_executions {
            stored.push(executions::insert_execution(&mut *tx, instance.id, execution).await?);
        }

        tx.commit().await?;
        Ok((instance, stored))
    }

    async fn get_instance(&self, id: i64) -> AppResult<Option<Instance>> {
        instances::get_instance(&self.pool, id).await
    }

    async fn list_instances(&self) -> AppResult<Vec<Instance>> {
        instances::list_instances(&self.pool).await
    }

    async fn save_transition(
        &self,
        instance: &Instance,
        close: Option<ExecutionClose>,
        next: Option<NewExecution>,
    ) -> AppResult<Transition> {
        let mut tx = self.pool.begin().await?;

        let closed = match close {
            Some(close) => {
                let closed = executions::complete_execution(
                    &mut *tx,
                    close.execution_id,
                    close.end_time,
                    close.actual_duration,
                )
                .await?
                .filter(|e| e.instance_id == instance.id)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Running execution {} not found",
                        close.execution_id
                    ))
                })?;
                Some(closed)
            }
            None => None,
        };
        if !instances::update_instance(&mut *tx, instance).await? {
            return Err(AppError::NotFound(format!(
                "Instance {} not found",
                instance.id
            )));
        }
        let opened = match &next {
            Some(execution) => {
                Some(executions::insert_execution(&mut *tx, instance.id, execution).await?)
            }
            None => None,
        };

        tx.commit().await?;
        Ok(Transition { closed, opened })
    }

    async fn count_instances(&self) -> AppResult<InstanceCounts> {
        instances::count_instances(&self.pool).await
    }

    async fn insert_execution(
        &self,
        instance_id: i64,
        execution: NewExecution,
    ) -> AppResult<Execution> {
        if instances::get_instance(&self.pool, instance_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Instance {} not found",
                instance_id
            )));
        }
        executions::insert_execution(&self.pool, instance_id, &execution).await
    }

    async fn get_execution(&self, id: i64) -> AppResult<Option<Execution>> {
        executions::get_execution(&self.pool, id).await
    }

    async fn running_execution(&self, instance_id: i64) -> AppResult<Option<Execution>> {
        executions::running_execution(&self.pool, instance_id).await
    }

    async fn complete_execution(
        &self,
        id: i64,
        end_time: DateTime<Utc>,
        actual_duration: i64,
    ) -> AppResult<Option<Execution>> {
        executions::complete_execution(&self.pool, id, end_time, actual_duration).await
    }

    async fn executions_for(&self, instance_ids: &[i64]) -> AppResult<Vec<Execution>> {
        if instance_ids.is_empty() {
            return Ok(Vec::new());
        }
        executions::list_for_instances(&self.pool, instance_ids).await
    }

    async fn completed_executions(&self) -> AppResult<Vec<Execution>> {
        executions::list_completed(&self.pool).await
    }

    async fn append_log(&self, entry: NewSystemLog) -> AppResult<SystemLog> {
        logs::insert_log(&self.pool, &entry).await
    }

    async fn recent_logs(&self, limit: i64) -> AppResult<Vec<SystemLog>> {
        logs::recent_logs(&self.pool, limit).await
    }
}
