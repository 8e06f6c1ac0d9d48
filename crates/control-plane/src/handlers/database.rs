//! Storage bootstrap handler.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

/// Response for schema operations.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaOperationResponse {
    pub status: String,
    pub message: String,

    /// `memory` or `postgres`
    pub backend: String,
}

/// Apply the schema to the configured store. Safe to repeat.
///
/// `POST /api/db/init`
pub async fn init_database(
    State(state): State<AppState>,
) -> AppResult<Json<SchemaOperationResponse>> {
    state.store.initialize().await?;
    let backend = state.store.backend();
    tracing::info!(backend, "Storage initialized on request");

    Ok(Json(SchemaOperationResponse {
        status: "ok".to_string(),
        message: format!("{} storage initialized", backend),
        backend: backend.to_string(),
    }))
}
