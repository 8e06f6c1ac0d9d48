//! Persistence interface for templates, instances, executions and the
//! audit log.
//!
//! Two backends implement [`WorkflowStore`]: [`MemoryWorkflowStore`] keeps
//! everything in process (tests, local runs) and [`PgWorkflowStore`] is the
//! PostgreSQL source of truth.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{
    Execution, ExecutionClose, Instance, InstanceCounts, NewExecution, NewInstance, NewSystemLog,
    SystemLog, Template, TemplateNode, Transition,
};
use crate::error::AppResult;

pub use memory::MemoryWorkflowStore;
pub use postgres::PgWorkflowStore;

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Prepare the backing storage (schema bootstrap for PostgreSQL).
    async fn initialize(&self) -> AppResult<()>;

    /// Whether the backend is reachable.
    async fn ping(&self) -> bool;

    /// Insert a template at version 1.
    async fn insert_template(
        &self,
        name: &str,
        nodes: &[TemplateNode],
        created_at: DateTime<Utc>,
    ) -> AppResult<Template>;

    /// Template by id, soft-deleted ones included.
    async fn get_template(&self, id: i64) -> AppResult<Option<Template>>;

    /// Oldest live template with this exact name.
    async fn find_template_by_name(&self, name: &str) -> AppResult<Option<Template>>;

    /// Replace name and nodes of a live template, bumping its version.
    /// `None` when the template is missing or soft-deleted.
    async fn update_template(
        &self,
        id: i64,
        name: &str,
        nodes: &[TemplateNode],
    ) -> AppResult<Option<Template>>;

    /// Flag a template as deleted. `false` when no template has this id.
    async fn soft_delete_template(&self, id: i64) -> AppResult<bool>;

    /// Live templates in id order.
    async fn list_templates(&self) -> AppResult<Vec<Template>>;

    /// Insert an instance and its executions atomically.
    ///
    /// Fails with `Conflict` if more than one of the executions is `Running`.
    async fn create_instance(
        &self,
        instance: NewInstance,
        executions: Vec<NewExecution>,
    ) -> AppResult<(Instance, Vec<Execution>)>;

    async fn get_instance(&self, id: i64) -> AppResult<Option<Instance>>;

    /// All instances in id order.
    async fn list_instances(&self) -> AppResult<Vec<Instance>>;

    /// Persist a state change of `instance` in one transaction: close its
    /// running execution, update the instance row, and open the execution
    /// for its new node. Nothing is written when any step fails; a `close`
    /// that does not match a running execution of the instance is `NotFound`.
    async fn save_transition(
        &self,
        instance: &Instance,
        close: Option<ExecutionClose>,
        next: Option<NewExecution>,
    ) -> AppResult<Transition>;

    async fn count_instances(&self) -> AppResult<InstanceCounts>;

    /// Insert an execution. `Conflict` if a `Running` one would be the
    /// instance's second.
    async fn insert_execution(
        &self,
        instance_id: i64,
        execution: NewExecution,
    ) -> AppResult<Execution>;

    async fn get_execution(&self, id: i64) -> AppResult<Option<Execution>>;

    async fn running_execution(&self, instance_id: i64) -> AppResult<Option<Execution>>;

    /// Mark a `Running` execution completed. `None` when it is missing or
    /// not running.
    async fn complete_execution(
        &self,
        id: i64,
        end_time: DateTime<Utc>,
        actual_duration: i64,
    ) -> AppResult<Option<Execution>>;

    /// Executions belonging to any of `instance_ids`, in id order.
    async fn executions_for(&self, instance_ids: &[i64]) -> AppResult<Vec<Execution>>;

    /// Completed executions with a measured duration, in id order.
    async fn completed_executions(&self) -> AppResult<Vec<Execution>>;

    async fn append_log(&self, entry: NewSystemLog) -> AppResult<SystemLog>;

    /// Newest `limit` audit entries, newest first.
    async fn recent_logs(&self, limit: i64) -> AppResult<Vec<SystemLog>>;
}

pub type SharedStore = Arc<dyn WorkflowStore>;
