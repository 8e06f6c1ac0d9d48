//! In-process store.
//!
//! All tables sit behind one lock so multi-row writes are atomic the same
//! way a PostgreSQL transaction is.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::WorkflowStore;
use crate::db::models::{
    Execution, ExecutionClose, ExecutionStatus, Instance, InstanceCounts, InstanceStatus,
    NewExecution, NewInstance, NewSystemLog, SystemLog, Template, TemplateNode, Transition,
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct Tables {
    templates: BTreeMap<i64, Template>,
    instances: BTreeMap<i64, Instance>,
    executions: BTreeMap<i64, Execution>,
    logs: Vec<SystemLog>,
    last_template_id: i64,
    last_instance_id: i64,
    last_execution_id: i64,
    last_log_id: i64,
}

impl Tables {
    fn has_running(&self, instance_id: i64) -> bool {
        self.executions
            .values()
            .any(|e| e.instance_id == instance_id && e.status == ExecutionStatus::Running)
    }

    fn push_execution(&mut self, instance_id: i64, new: NewExecution) -> AppResult<Execution> {
        if new.status == ExecutionStatus::Running && self.has_running(instance_id) {
            return Err(AppError::Conflict(format!(
                "Instance {} already has a running execution",
                instance_id
            )));
        }
        self.last_execution_id += 1;
        let execution = new.into_execution(self.last_execution_id, instance_id);
        self.executions.insert(execution.id, execution.clone());
        Ok(execution)
    }
}

#[derive(Debug, Default)]
pub struct MemoryWorkflowStore {
    tables: RwLock<Tables>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> AppResult<()> {
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn insert_template(
        &self,
        name: &str,
        nodes: &[TemplateNode],
        created_at: DateTime<Utc>,
    ) -> AppResult<Template> {
        let mut tables = self.tables.write();
        tables.last_template_id += 1;
        let template = Template {
            id: tables.last_template_id,
            name: name.to_string(),
            version: 1,
            nodes: nodes.to_vec(),
            is_deleted: false,
            created_at,
        };
        tables.templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_template(&self, id: i64) -> AppResult<Option<Template>> {
        Ok(self.tables.read().templates.get(&id).cloned())
    }

    async fn find_template_by_name(&self, name: &str) -> AppResult<Option<Template>> {
        Ok(self
            .tables
            .read()
            .templates
            .values()
            .find(|t| !t.is_deleted && t.name == name)
            .cloned())
    }

    async fn update_template(
        &self,
        id: i64,
        name: &str,
        nodes: &[TemplateNode],
    ) -> AppResult<Option<Template>> {
        let mut tables = self.tables.write();
        let Some(template) = tables.templates.get_mut(&id).filter(|t| !t.is_deleted) else {
            return Ok(None);
        };
        template.name = name.to_string();
        template.nodes = nodes.to_vec();
        template.version += 1;
        Ok(Some(template.clone()))
    }

    async fn soft_delete_template(&self, id: i64) -> AppResult<bool> {
        let mut tables = self.tables.write();
        match tables.templates.get_mut(&id) {
            Some(template) => {
                template.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_templates(&self) -> AppResult<Vec<Template>> {
        Ok(self
            .tables
            .read()
            .templates
            .values()
            .filter(|t| !t.is_deleted)
            .cloned()
            .collect())
    }

    async fn create_instance(
        &self,
        instance: NewInstance,
        executions: Vec<NewExecution>,
    ) -> AppResult<(Instance, Vec<Execution>)> {
        let running = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Running)
            .count();
        if running > 1 {
            return Err(AppError::Conflict(
                "An instance can have at most one running execution".to_string(),
            ));
        }

        let mut tables = self.tables.write();
        if !tables.templates.contains_key(&instance.template_id) {
            return Err(AppError::NotFound(format!(
                "Template {} not found",
                instance.template_id
            )));
        }
        tables.last_instance_id += 1;
        let instance = instance.into_instance(tables.last_instance_id);
        tables.instances.insert(instance.id, instance.clone());

        let mut stored = Vec::with_capacity(executions.len());
        for execution in executions {
            stored.push(tables.push_execution(instance.id, execution)?);
        }
        Ok((instance, stored))
    }

    async fn get_instance(&self, id: i64) -> AppResult<Option<Instance>> {
        Ok(self.tables.read().instances.get(&id).cloned())
    }

    async fn list_instances(&self) -> AppResult<Vec<Instance>> {
        Ok(self.tables.read().instances.values().cloned().collect())
    }

    async fn save_transition(
        &self,
        instance: &Instance,
        close: Option<ExecutionClose>,
        next: Option<NewExecution>,
    ) -> AppResult<Transition> {
        let mut tables = self.tables.write();
        if !tables.instances.contains_key(&instance.id) {
            return Err(AppError::NotFound(format!(
                "Instance {} not found",
                instance.id
            )));
        }
        if let Some(close) = &close {
            let closable = match tables.executions.get(&close.execution_id) {
                Some(e) => e.instance_id == instance.id && e.status == ExecutionStatus::Running,
                None => false,
            };
            if !closable {
                return Err(AppError::NotFound(format!(
                    "Running execution {} not found",
                    close.execution_id
                )));
            }
        }
        let opens_running = matches!(&next, Some(n) if n.status == ExecutionStatus::Running);
        if opens_running && close.is_none() && tables.has_running(instance.id) {
            return Err(AppError::Conflict(format!(
                "Instance {} already has a running execution",
                instance.id
            )));
        }

        let closed = close.and_then(|close| {
            let execution = tables.executions.get_mut(&close.execution_id)?;
            execution.status = ExecutionStatus::Completed;
            execution.end_time = Some(close.end_time);
            execution.actual_duration = Some(close.actual_duration);
            Some(execution.clone())
        });
        tables.instances.insert(instance.id, instance.clone());
        let opened = next
            .map(|execution| tables.push_execution(instance.id, execution))
            .transpose()?;
        Ok(Transition { closed, opened })
    }

    async fn count_instances(&self) -> AppResult<InstanceCounts> {
        let tables = self.tables.read();
        let active = tables
            .instances
            .values()
            .filter(|i| i.status == InstanceStatus::Running)
            .count();
        Ok(InstanceCounts {
            total: tables.instances.len() as i64,
            active: active as i64,
        })
    }

    async fn insert_execution(
        &self,
        instance_id: i64,
        execution: NewExecution,
    ) -> AppResult<Execution> {
        let mut tables = self.tables.write();
        if !tables.instances.contains_key(&instance_id) {
            return Err(AppError::NotFound(format!(
                "Instance {} not found",
                instance_id
            )));
        }
        tables.push_execution(instance_id, execution)
    }

    async fn get_execution(&self, id: i64) -> AppResult<Option<Execution>> {
        Ok(self.tables.read().executions.get(&id).cloned())
    }

    async fn running_execution(&self, instance_id: i64) -> AppResult<Option<Execution>> {
        Ok(self
            .tables
            .read()
            .executions
            .values()
            .find(|e| e.instance_id == instance_id && e.status == ExecutionStatus::Running)
            .cloned())
    }

    async fn complete_execution(
        &self,
        id: i64,
        end_time: DateTime<Utc>,
        actual_duration: i64,
    ) -> AppResult<Option<Execution>> {
        let mut tables = self.tables.write();
        let Some(execution) = tables
            .executions
            .get_mut(&id)
            .filter(|e| e.status == ExecutionStatus::Running)
        else {
            return Ok(None);
        };
        execution.status = ExecutionStatus::Completed;
        execution.end_time = Some(end_time);
        execution.actual_duration = Some(actual_duration);
        Ok(Some(execution.clone()))
    }

    async fn executions_for(&self, instance_ids: &[i64]) -> AppResult<Vec<Execution>> {
        Ok(self
            .tables
            .read()
            .executions
            .values()
            .filter(|e| instance_ids.contains(&e.instance_id))
            .cloned()
            .collect())
    }

    async fn completed_executions(&self) -> AppResult<Vec<Execution>> {
        Ok(self
            .tables
            .read()
            .executions
            .values()
            .filter(|e| e.status == ExecutionStatus::Completed && e.actual_duration.is_some())
            .cloned()
            .collect())
    }

    async fn append_log(&self, entry: NewSystemLog) -> AppResult<SystemLog> {
        let mut tables = self.tables.write();
        tables.last_log_id += 1;
        let log = entry.into_log(tables.last_log_id);
        tables.logs.push(log.clone());
        Ok(log)
    }

    async fn recent_logs(&self, limit: i64) -> AppResult<Vec<SystemLog>> {
        let tables = self.tables.read();
        let mut logs = tables.logs.clone();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        logs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> Vec<TemplateNode> {
        ids.iter().map(|id| TemplateNode::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_template_versioning_and_soft_delete() {
        let store = MemoryWorkflowStore::new();
        let now = Utc::now();
        let created = store
            .insert_template("Purchase", &nodes(&["A", "B"]), now)
            .await
            .unwrap();
        assert_eq!(created.version, 1);

        let updated = store
            .update_template(created.id, "Purchase v2", &nodes(&["A", "B", "C"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.nodes.len(), 3);

        assert!(store.soft_delete_template(created.id).await.unwrap());
        assert!(store.list_templates().await.unwrap().is_empty());
        assert!(store
            .update_template(created.id, "x", &nodes(&["A"]))
            .await
            .unwrap()
            .is_none());
        // Still readable by id
        assert!(store.get_template(created.id).await.unwrap().unwrap().is_deleted);
        assert!(!store.soft_delete_template(999).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_running_execution_conflicts() {
        let store = MemoryWorkflowStore::new();
        let now = Utc::now();
        let template = store
            .insert_template("t", &nodes(&["A", "B"]), now)
            .await
            .unwrap();
        let (instance, executions) = store
            .create_instance(
                NewInstance::running(template.id, "A", now),
                vec![NewExecution::running("A", None, now, 300)],
            )
            .await
            .unwrap();
        assert_eq!(executions.len(), 1);

        let result = store
            .insert_execution(instance.id, NewExecution::running("B", None, now, 300))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let running = store.running_execution(instance.id).await.unwrap().unwrap();
        store
            .complete_execution(running.id, now, 0)
            .await
            .unwrap()
            .unwrap();
        // Closing twice is a no-op
        assert!(store
            .complete_execution(running.id, now, 0)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .insert_execution(instance.id, NewExecution::running("B", None, now, 300))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_save_transition_unknown_instance() {
        let store = MemoryWorkflowStore::new();
        let now = Utc::now();
        let ghost = NewInstance::running(1, "A", now).into_instance(42);
        let result = store.save_transition(&ghost, None, None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(
            store.count_instances().await.unwrap(),
            InstanceCounts::default()
        );
    }

    #[tokio::test]
    async fn test_save_transition_closes_and_opens_together() {
        let store = MemoryWorkflowStore::new();
        let now = Utc::now();
        let template = store
            .insert_template("t", &nodes(&["A", "B"]), now)
            .await
            .unwrap();
        let (mut instance, executions) = store
            .create_instance(
                NewInstance::running(template.id, "A", now),
                vec![NewExecution::running("A", None, now, 300)],
            )
            .await
            .unwrap();
        let later = now + chrono::Duration::seconds(20);
        let close = ExecutionClose::at(&executions[0], later);

        instance.move_to("B");
        let transition = store
            .save_transition(
                &instance,
                Some(close),
                Some(NewExecution::running("B", None, later, 300)),
            )
            .await
            .unwrap();
        let closed = transition.closed.unwrap();
        assert_eq!(closed.status, ExecutionStatus::Completed);
        assert_eq!(closed.actual_duration, Some(20));
        assert_eq!(transition.opened.unwrap().node_id, "B");

        // Replaying the same close matches no running execution; nothing changes
        instance.finish(InstanceStatus::Completed, later);
        let replay = store.save_transition(&instance, Some(close), None).await;
        assert!(matches!(replay, Err(AppError::NotFound(_))));
        let stored = store.get_instance(instance.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InstanceStatus::Running);
        assert_eq!(stored.current_node_id.as_deref(), Some("B"));
        let running = store.running_execution(instance.id).await.unwrap().unwrap();
        assert_eq!(running.node_id, "B");
    }

    #[tokio::test]
    async fn test_recent_logs_newest_first() {
        let store = MemoryWorkflowStore::new();
        let now = Utc::now();
        for (offset, action) in ["A", "B", "C"].iter().enumerate() {
            store
                .append_log(NewSystemLog {
                    user_id: Some(1),
                    action: action.to_string(),
                    details: None,
                    created_at: now + chrono::Duration::seconds(offset as i64),
                })
                .await
                .unwrap();
        }
        let logs = store.recent_logs(2).await.unwrap();
        let actions: Vec<_> = logs.iter().map(|l| l.action.as_str()).collect();
        assert_eq!(actions, vec!["C", "B"]);
    }
}
