//! procflow Control Plane Server
//!
//! HTTP server for workflow templates and instances, with node duration
//! estimates from the procflow estimator.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use procflow_control_plane::{
    clock::{SharedClock, SystemClock},
    config::{estimator_config_from_env, AppConfig, DatabaseConfig, StoreBackend},
    db::create_pool,
    router::build_router,
    services::DemoSeeder,
    state::AppState,
    store::{MemoryWorkflowStore, PgWorkflowStore, SharedStore},
};
use procflow_estimator::{DurationEstimator, EstimatorConfig};

/// Initialize tracing/logging.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,procflow_control_plane=debug,procflow_estimator=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Open the configured store and prepare its schema.
async fn open_store(config: &AppConfig) -> anyhow::Result<SharedStore> {
    let store: SharedStore = match config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Arc::new(MemoryWorkflowStore::new())
        }
        StoreBackend::Postgres => {
            let db_config = DatabaseConfig::from_env().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load database config, using defaults");
                DatabaseConfig::default()
            });
            let pool = create_pool(&db_config).await?;
            Arc::new(PgWorkflowStore::new(pool))
        }
    };
    store.initialize().await?;
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting procflow Control Plane"
    );

    let app_config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load app config, using defaults");
        AppConfig::default()
    });

    let estimator_config = estimator_config_from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load estimator config, using defaults");
        EstimatorConfig::default()
    });

    tracing::info!(
        host = %app_config.host,
        port = app_config.port,
        debug = app_config.debug,
        store = app_config.store.as_str(),
        retrain_on_complete = app_config.retrain_on_complete,
        "Configuration loaded"
    );

    let store = open_store(&app_config).await?;
    let clock: SharedClock = Arc::new(SystemClock);
    let estimator = Arc::new(DurationEstimator::new(estimator_config));

    let state = AppState::new(store.clone(), estimator, clock.clone(), app_config.clone());

    if app_config.seed_demo {
        let mut seeder = DemoSeeder::new(store, clock, state.engine.retrainer().clone());
        seeder.seed().await?;
    } else {
        // Warm the estimator from whatever history exists
        state.engine.retrainer().ensure_trained().await;
    }

    let app = build_router(state);

    let addr: SocketAddr = app_config.bind_address().parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, server = %app_config.server_name, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
