//! Audit trail of state-changing API calls.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::db::models::{NewSystemLog, SystemLog};
use crate::error::AppResult;
use crate::result_ext::ResultExt;
use crate::store::SharedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateTemplate,
    UpdateTemplate,
    DeleteTemplate,
    StartInstance,
    CompleteTask,
    TerminateInstance,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateTemplate => "CREATE_TEMPLATE",
            AuditAction::UpdateTemplate => "UPDATE_TEMPLATE",
            AuditAction::DeleteTemplate => "DELETE_TEMPLATE",
            AuditAction::StartInstance => "START_INSTANCE",
            AuditAction::CompleteTask => "COMPLETE_TASK",
            AuditAction::TerminateInstance => "TERMINATE_INSTANCE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct AuditService {
    store: SharedStore,
    clock: SharedClock,
}

impl AuditService {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Append an entry. A failed write is logged and otherwise ignored.
    pub async fn record(
        &self,
        user_id: Option<i64>,
        action: AuditAction,
        details: impl Into<String>,
    ) {
        let entry = NewSystemLog {
            user_id,
            action: action.as_str().to_string(),
            details: Some(details.into()),
            created_at: self.clock.now(),
        };
        self.store
            .append_log(entry)
            .await
            .ok_logged(format_args!("recording {} audit entry", action));
    }

    pub async fn recent(&self, limit: i64) -> AppResult<Vec<SystemLog>> {
        self.store.recent_logs(limit.max(0)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryWorkflowStore;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let store: SharedStore = Arc::new(MemoryWorkflowStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let audit = AuditService::new(store, clock.clone());

        audit
            .record(
                Some(1),
                AuditAction::CreateTemplate,
                "Created template Flow",
            )
            .await;
        clock.advance(Duration::seconds(1));
        audit
            .record(
                Some(2),
                AuditAction::CompleteTask,
                "Completed node in instance 4",
            )
            .await;

        let logs = audit.recent(100).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, "COMPLETE_TASK");
        assert_eq!(logs[0].user_id, Some(2));
        assert_eq!(logs[1].action, "CREATE_TEMPLATE");
        assert!(audit.recent(-5).await.unwrap().is_empty());
    }

    #[test]
    fn test_action_serializes_like_stored_text() {
        let json = serde_json::to_value(AuditAction::TerminateInstance).unwrap();
        assert_eq!(json, AuditAction::TerminateInstance.as_str());
    }
}
