//! Template authoring: create, update, soft delete, list.

use std::collections::HashSet;

use crate::clock::SharedClock;
use crate::db::models::{Template, TemplateNode, TemplateRequest};
use crate::error::{AppError, AppResult};
use crate::store::SharedStore;

/// Service for template operations.
#[derive(Clone)]
pub struct TemplateService {
    store: SharedStore,
    clock: SharedClock,
}

impl TemplateService {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Register a new template at version 1.
    pub async fn create(&self, request: TemplateRequest) -> AppResult<Template> {
        let (name, nodes) = validate(request)?;
        let template = self
            .store
            .insert_template(&name, &nodes, self.clock.now())
            .await?;

        tracing::info!(
            template_id = template.id,
            name = %template.name,
            nodes = template.nodes.len(),
            "Template created"
        );
        Ok(template)
    }

    /// Replace name and nodes, bumping the version.
    pub async fn update(&self, id: i64, request: TemplateRequest) -> AppResult<Template> {
        let (name, nodes) = validate(request)?;
        let template = self
            .store
            .update_template(id, &name, &nodes)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Template {} not found", id)))?;

        tracing::info!(
            template_id = id,
            version = template.version,
            "Template updated"
        );
        Ok(template)
    }

    /// Soft delete. Deleting an already deleted template succeeds.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        if !self.store.soft_delete_template(id).await? {
            return Err(AppError::NotFound(format!("Template {} not found", id)));
        }
        tracing::info!(template_id = id, "Template deleted");
        Ok(())
    }

    pub async fn list(&self) -> AppResult<Vec<Template>> {
        self.store.list_templates().await
    }

    /// Live template by id.
    pub async fn get(&self, id: i64) -> AppResult<Template> {
        self.store
            .get_template(id)
            .await?
            .filter(|t| !t.is_deleted)
            .ok_or_else(|| AppError::NotFound(format!("Template {} not found", id)))
    }
}

/// Check a request and return its trimmed name and nodes.
fn validate(request: TemplateRequest) -> AppResult<(String, Vec<TemplateNode>)> {
    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation(
            "Template name must not be empty".to_string(),
        ));
    }
    if request.nodes.is_empty() {
        return Err(AppError::Validation(
            "Template must have at least one node".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(request.nodes.len());
    for node in &request.nodes {
        if node.id.trim().is_empty() {
            return Err(AppError::Validation(
                "Node ids must not be blank".to_string(),
            ));
        }
        if !seen.insert(node.id.as_str()) {
            return Err(AppError::Validation(format!(
                "Duplicate node id '{}'",
                node.id
            )));
        }
    }

    Ok((name, request.nodes))
}
