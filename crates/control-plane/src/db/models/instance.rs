//! Workflow instance model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::execution::Execution;
use crate::error::AppError;

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceStatus {
    Running,
    Completed,
    Terminated,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Running => "Running",
            InstanceStatus::Completed => "Completed",
            InstanceStatus::Terminated => "Terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Running)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Running" => Ok(InstanceStatus::Running),
            "Completed" => Ok(InstanceStatus::Completed),
            "Terminated" => Ok(InstanceStatus::Terminated),
            other => Err(AppError::Internal(format!(
                "Unknown instance status '{}'",
                other
            ))),
        }
    }
}

/// A run of a template.
///
/// `current_node_id` is set exactly while the instance is `Running`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    pub template_id: i64,
    pub current_node_id: Option<String>,
    pub status: InstanceStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }

    /// Move to `node_id`, staying `Running`.
    pub fn move_to(&mut self, node_id: &str) {
        self.current_node_id = Some(node_id.to_string());
    }

    /// Leave the `Running` state for good.
    pub fn finish(&mut self, status: InstanceStatus, at: DateTime<Utc>) {
        self.status = status;
        self.current_node_id = None;
        self.end_time = Some(at);
    }
}

/// Instance fields known before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewInstance {
    pub template_id: i64,
    pub current_node_id: Option<String>,
    pub status: InstanceStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl NewInstance {
    /// A `Running` instance positioned at `node_id`.
    pub fn running(
        template_id: i64,
        node_id: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            template_id,
            current_node_id: Some(node_id.into()),
            status: InstanceStatus::Running,
            start_time,
            end_time: None,
        }
    }

    pub fn into_instance(self, id: i64) -> Instance {
        Instance {
            id,
            template_id: self.template_id,
            current_node_id: self.current_node_id,
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Instance together with its executions, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceView {
    #[serde(flatten)]
    pub instance: Instance,
    pub executions: Vec<Execution>,
}

/// Body of `POST /api/instances`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartInstanceRequest {
    pub template_id: i64,
}

/// Instance totals for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceCounts {
    pub total: i64,
    pub active: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_text() {
        for status in [
            InstanceStatus::Running,
            InstanceStatus::Completed,
            InstanceStatus::Terminated,
        ] {
            assert_eq!(status.as_str().parse::<InstanceStatus>().unwrap(), status);
        }
        assert!("running".parse::<InstanceStatus>().is_err());
    }

    #[test]
    fn test_finish_clears_current_node() {
        let now = Utc::now();
        let mut instance = Instance {
            id: 1,
            template_id: 1,
            current_node_id: Some("A".to_string()),
            status: InstanceStatus::Running,
            start_time: now,
            end_time: None,
        };
        instance.finish(InstanceStatus::Completed, now);
        assert!(instance.current_node_id.is_none());
        assert_eq!(instance.end_time, Some(now));
        assert!(instance.status.is_terminal());
    }

    #[test]
    fn test_view_flattens_instance() {
        let view = InstanceView {
            instance: Instance {
                id: 7,
                template_id: 2,
                current_node_id: Some("A".to_string()),
                status: InstanceStatus::Running,
                start_time: Utc::now(),
                end_time: None,
            },
            executions: vec![],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["status"], "Running");
        assert_eq!(json["current_node_id"], "A");
        assert!(json["executions"].as_array().unwrap().is_empty());
    }
}
