//! Template API handlers.

use axum::{
    extract::{Path, State},
    Json,
};

use super::StatusResponse;
use crate::db::models::{Template, TemplateRequest};
use crate::error::AppResult;
use crate::identity::Caller;
use crate::services::AuditAction;
use crate::state::AppState;

/// Register a template.
///
/// `POST /api/templates` (admin)
///
/// ```json
/// {
///   "name": "Leave Application",
///   "nodes": [{"id": "Submit"}, {"id": "HR Filing"}, {"id": "End"}]
/// }
/// ```
pub async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<TemplateRequest>,
) -> AppResult<Json<Template>> {
    caller.require_admin("create templates")?;
    let template = state.templates.create(request).await?;
    state
        .audit
        .record(
            caller.id,
            AuditAction::CreateTemplate,
            format!("Created template {}", template.name),
        )
        .await;
    Ok(Json(template))
}

/// List live templates.
///
/// `GET /api/templates`
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Template>>> {
    Ok(Json(state.templates.list().await?))
}

/// `GET /api/templates/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Template>> {
    Ok(Json(state.templates.get(id).await?))
}

/// Replace a template's name and nodes; the version goes up by one.
///
/// `PUT /api/templates/{id}` (admin)
pub async fn update(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    Json(request): Json<TemplateRequest>,
) -> AppResult<Json<Template>> {
    caller.require_admin("update templates")?;
    let template = state.templates.update(id, request).await?;
    state
        .audit
        .record(
            caller.id,
            AuditAction::UpdateTemplate,
            format!("Updated template {} to version {}", id, template.version),
        )
        .await;
    Ok(Json(template))
}

/// Soft delete.
///
/// `DELETE /api/templates/{id}` (admin)
pub async fn delete(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<StatusResponse>> {
    caller.require_admin("delete templates")?;
    state.templates.delete(id).await?;
    state
        .audit
        .record(
            caller.id,
            AuditAction::DeleteTemplate,
            format!("Deleted template {}", id),
        )
        .await;
    Ok(Json(StatusResponse::with_message(format!(
        "Template {} deleted",
        id
    ))))
}
