//! Dashboard and analytics handlers.

use axum::{extract::State, Json};
use procflow_estimator::EstimatorMetrics;

use crate::error::AppResult;
use crate::services::DashboardStats;
use crate::state::AppState;

/// Instance totals and predicted vs. actual durations.
///
/// `GET /api/dashboard/stats`
///
/// ```json
/// {
///   "total_instances": 20,
///   "active_instances": 5,
///   "accuracy_data": [{"id": 1, "actual": 1800, "predicted": 1650}]
/// }
/// ```
pub async fn get_stats(State(state): State<AppState>) -> AppResult<Json<DashboardStats>> {
    Ok(Json(state.dashboard.stats().await?))
}

/// Model comparison; trains first when no model exists yet.
///
/// `GET /api/analytics/benchmarks`
///
/// ```json
/// {
///   "trained": true,
///   "random_forest": {"mse": 120.5, "r2": 0.85},
///   "linear_regression": {"mse": 350.2, "r2": 0.65},
///   "accuracy": {"random_forest": 85.0, "linear_regression": 65.0, "best_model": "random_forest"}
/// }
/// ```
pub async fn get_benchmarks(State(state): State<AppState>) -> Json<EstimatorMetrics> {
    Json(state.engine.benchmarks().await)
}
