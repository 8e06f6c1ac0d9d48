//! Node execution model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use procflow_estimator::ExecutionSample;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// State of one node visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "Pending",
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ExecutionStatus::Pending),
            "Running" => Ok(ExecutionStatus::Running),
            "Completed" => Ok(ExecutionStatus::Completed),
            other => Err(AppError::Internal(format!(
                "Unknown execution status '{}'",
                other
            ))),
        }
    }
}

/// One timed visit of an instance to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: i64,
    pub instance_id: i64,
    pub node_id: String,
    pub executed_by: Option<i64>,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,

    /// Estimate made when the node was entered, in seconds
    pub predicted_duration: Option<i64>,

    /// Measured duration in seconds, set on completion
    pub actual_duration: Option<i64>,
}

impl Execution {
    /// Training row for the estimator; only completed executions qualify.
    pub fn to_sample(&self) -> Option<ExecutionSample> {
        if self.status != ExecutionStatus::Completed {
            return None;
        }
        self.actual_duration.map(|actual| ExecutionSample {
            node_id: self.node_id.clone(),
            executor_id: self.executed_by,
            started_at: self.start_time,
            actual_duration: actual,
        })
    }
}

/// Execution fields known before the store assigns ids.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub node_id: String,
    pub executed_by: Option<i64>,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub predicted_duration: Option<i64>,
    pub actual_duration: Option<i64>,
}

impl NewExecution {
    /// A `Running` execution entered at `start_time`.
    pub fn running(
        node_id: impl Into<String>,
        executed_by: Option<i64>,
        start_time: DateTime<Utc>,
        predicted_duration: i64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            executed_by,
            status: ExecutionStatus::Running,
            start_time,
            end_time: None,
            predicted_duration: Some(predicted_duration),
            actual_duration: None,
        }
    }

    pub fn into_execution(self, id: i64, instance_id: i64) -> Execution {
        Execution {
            id,
            instance_id,
            node_id: self.node_id,
            executed_by: self.executed_by,
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
            predicted_duration: self.predicted_duration,
            actual_duration: self.actual_duration,
        }
    }
}

/// Completion of a running execution, applied by the store together with
/// the instance update it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionClose {
    pub execution_id: i64,
    pub end_time: DateTime<Utc>,
    pub actual_duration: i64,
}

impl ExecutionClose {
    pub fn at(execution: &Execution, end_time: DateTime<Utc>) -> Self {
        Self {
            execution_id: execution.id,
            end_time,
            actual_duration: elapsed_seconds(execution.start_time, end_time),
        }
    }
}

/// Rows written by one instance transition.
#[derive(Debug, Clone, Default)]
pub struct Transition {
    pub closed: Option<Execution>,
    pub opened: Option<Execution>,
}

/// Whole seconds between `start` and `end`, floored at zero.
pub fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().max(0)
}
