//! HTTP handlers for the procflow Control Plane API.
//!
//! Handlers are thin: parse the request, check the caller's role where an
//! action is restricted, call a service, record the audit entry.

pub mod dashboard;
pub mod database;
pub mod health;
pub mod instances;
pub mod logs;
pub mod templates;

use serde::{Deserialize, Serialize};

pub use health::{api_health, health_check};

/// Generic acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.into()),
        }
    }
}
