//! Audit log handler.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::db::models::SystemLog;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
}

/// Newest audit entries first.
///
/// `GET /api/logs?limit=N`, capped at `PROCFLOW_LOG_LIMIT`.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> AppResult<Json<Vec<SystemLog>>> {
    let cap = state.config.log_limit;
    let limit = query.limit.map_or(cap, |l| l.min(cap));
    Ok(Json(state.audit.recent(limit).await?))
}
