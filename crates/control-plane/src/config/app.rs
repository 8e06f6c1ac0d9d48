//! Application configuration for the procflow Control Plane server.

use serde::Deserialize;

/// Persistence backend behind the workflow store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local tables, lost on restart
    Memory,
    /// PostgreSQL through the connection pool
    Postgres,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Postgres => "postgres",
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `PROCFLOW_`:
/// - `PROCFLOW_HOST`: Server bind address (default: "0.0.0.0")
/// - `PROCFLOW_PORT`: Server port (default: 8000)
/// - `PROCFLOW_DEBUG`: Enable debug mode (default: false)
/// - `PROCFLOW_SERVER_NAME`: Server name for identification
/// - `PROCFLOW_STORE`: `postgres` (default) or `memory`
/// - `PROCFLOW_RETRAIN_ON_COMPLETE`: Retrain after each completed node (default: true)
/// - `PROCFLOW_SEED_DEMO`: Seed demo templates and history at startup (default: false)
/// - `PROCFLOW_LOG_LIMIT`: Number of audit entries returned by `/api/logs` (default: 100)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable debug mode
    #[serde(default)]
    pub debug: bool,

    /// Server name for identification
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Persistence backend
    #[serde(default = "default_store")]
    pub store: StoreBackend,

    /// Schedule a background retrain whenever a node completes
    #[serde(default = "default_true")]
    pub retrain_on_complete: bool,

    /// Seed demo data on startup
    #[serde(default)]
    pub seed_demo: bool,

    /// Audit log page size
    #[serde(default = "default_log_limit")]
    pub log_limit: i64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_server_name() -> String {
    "procflow-control-plane".to_string()
}

fn default_store() -> StoreBackend {
    StoreBackend::Postgres
}

fn default_true() -> bool {
    true
}

fn default_log_limit() -> i64 {
    100
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `PROCFLOW_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("PROCFLOW_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            server_name: default_server_name(),
            store: default_store(),
            retrain_on_complete: true,
            seed_demo: false,
            log_limit: default_log_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.store, StoreBackend::Postgres);
        assert!(config.retrain_on_complete);
        assert!(!config.seed_demo);
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_from_iter_parses_backend() {
        let vars = vec![
            ("STORE".to_string(), "memory".to_string()),
            ("PORT".to_string(), "9100".to_string()),
            ("RETRAIN_ON_COMPLETE".to_string(), "false".to_string()),
        ];
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.port, 9100);
        assert!(!config.retrain_on_complete);
        assert_eq!(config.log_limit, 100);
    }
}
