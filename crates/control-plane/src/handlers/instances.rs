//! Instance API handlers.

use axum::{
    extract::{Path, State},
    Json,
};

use super::StatusResponse;
use crate::db::models::{Instance, InstanceView, StartInstanceRequest};
use crate::error::AppResult;
use crate::identity::Caller;
use crate::services::AuditAction;
use crate::state::AppState;

/// Start an instance at the template's first node.
///
/// `POST /api/instances`
///
/// ```json
/// { "template_id": 1 }
/// ```
pub async fn start(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<StartInstanceRequest>,
) -> AppResult<Json<InstanceView>> {
    let view = state.engine.start(request.template_id, caller.id).await?;
    state
        .audit
        .record(
            caller.id,
            AuditAction::StartInstance,
            format!(
                "Started instance {} from template {}",
                view.instance.id, request.template_id
            ),
        )
        .await;
    Ok(Json(view))
}

/// `GET /api/instances`
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<InstanceView>>> {
    Ok(Json(state.engine.list().await?))
}

/// `GET /api/instances/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<InstanceView>> {
    Ok(Json(state.engine.get(id).await?))
}

/// Complete the current node.
///
/// `POST /api/instances/{id}/complete_node`
///
/// Returns `{"status": "success"}`; 404 for an unknown instance, 409 once
/// the instance is no longer running.
pub async fn complete_node(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<StatusResponse>> {
    state.engine.advance(id, caller.id).await?;
    state
        .audit
        .record(
            caller.id,
            AuditAction::CompleteTask,
            format!("Completed node in instance {}", id),
        )
        .await;
    Ok(Json(StatusResponse::success()))
}

/// Abort a running instance.
///
/// `POST /api/instances/{id}/terminate` (admin)
pub async fn terminate(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
) -> AppResult<Json<Instance>> {
    caller.require_admin("terminate instances")?;
    let instance = state.engine.terminate(id, caller.id).await?;
    state
        .audit
        .record(
            caller.id,
            AuditAction::TerminateInstance,
            format!("Terminated instance {}", id),
        )
        .await;
    Ok(Json(instance))
}
