//! Audit log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemLog {
    pub id: i64,
    pub user_id: Option<i64>,

    /// e.g. "CREATE_TEMPLATE", "COMPLETE_TASK"
    pub action: String,

    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSystemLog {
    pub user_id: Option<i64>,
    pub action: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewSystemLog {
    pub fn into_log(self, id: i64) -> SystemLog {
        SystemLog {
            id,
            user_id: self.user_id,
            action: self.action,
            details: self.details,
            created_at: self.created_at,
        }
    }
}
