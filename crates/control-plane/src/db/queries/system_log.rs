//! Audit log queries.

use sqlx::{FromRow, PgExecutor};

use crate::db::models::{NewSystemLog, SystemLog};
use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct SystemLogRow {
    id: i64,
    user_id: Option<i64>,
    action: String,
    details: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<SystemLogRow> for SystemLog {
    fn from(row: SystemLogRow) -> Self {
        SystemLog {
            id: row.id,
            user_id: row.user_id,
            action: row.action,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

pub async fn insert_log<'e, E>(executor: E, entry: &NewSystemLog) -> AppResult<SystemLog>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, SystemLogRow>(
        r#"
        INSERT INTO procflow.system_log (user_id, action, details, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, action, details, created_at
        "#,
    )
    .bind(entry.user_id)
    .bind(&entry.action)
    .bind(&entry.details)
    .bind(entry.created_at)
    .fetch_one(executor)
    .await?;

    Ok(row.into())
}

/// Newest entries first.
pub async fn recent_logs<'e, E>(executor: E, limit: i64) -> AppResult<Vec<SystemLog>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, SystemLogRow>(
        r#"
        SELECT id, user_id, action, details, created_at
        FROM procflow.system_log
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(SystemLog::from).collect())
}
