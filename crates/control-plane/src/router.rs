//! Route table for the procflow Control Plane API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the application router with all routes.
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - allow all origins for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::api_health));

    let template_routes = Router::new()
        .route(
            "/api/templates",
            post(handlers::templates::create).get(handlers::templates::list),
        )
        .route(
            "/api/templates/{id}",
            get(handlers::templates::get)
                .put(handlers::templates::update)
                .delete(handlers::templates::delete),
        );

    let instance_routes = Router::new()
        .route(
            "/api/instances",
            post(handlers::instances::start).get(handlers::instances::list),
        )
        .route("/api/instances/{id}", get(handlers::instances::get))
        .route(
            "/api/instances/{id}/complete_node",
            post(handlers::instances::complete_node),
        )
        .route(
            "/api/instances/{id}/terminate",
            post(handlers::instances::terminate),
        );

    let analytics_routes = Router::new()
        .route("/api/dashboard/stats", get(handlers::dashboard::get_stats))
        .route(
            "/api/analytics/benchmarks",
            get(handlers::dashboard::get_benchmarks),
        )
        .route("/api/logs", get(handlers::logs::list));

    let database_routes =
        Router::new().route("/api/db/init", post(handlers::database::init_database));

    Router::new()
        .merge(health_routes)
        .merge(template_routes)
        .merge(instance_routes)
        .merge(analytics_routes)
        .merge(database_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
