//! Node execution queries.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor};

use super::conflict_on_unique;
use crate::db::models::{Execution, NewExecution};
use crate::error::{AppError, AppResult};

const COLUMNS: &str = "id, instance_id, node_id, executed_by, status, start_time, end_time, \
                       predicted_duration, actual_duration";

#[derive(Debug, FromRow)]
struct ExecutionRow {
    id: i64,
    instance_id: i64,
    node_id: String,
    executed_by: Option<i64>,
    status: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    predicted_duration: Option<i64>,
    actual_duration: Option<i64>,
}

impl TryFrom<ExecutionRow> for Execution {
    type Error = AppError;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        Ok(Execution {
            id: row.id,
            instance_id: row.instance_id,
            node_id: row.node_id,
            executed_by: row.executed_by,
            status: row.status.parse()?,
            start_time: row.start_time,
            end_time: row.end_time,
            predicted_duration: row.predicted_duration,
            actual_duration: row.actual_duration,
        })
    }
}

fn convert(rows: Vec<ExecutionRow>) -> AppResult<Vec<Execution>> {
    rows.into_iter().map(Execution::try_from).collect()
}

/// Insert an execution.
///
/// A second `Running` row for the same instance trips the
/// `node_execution_one_running` index and surfaces as `Conflict`.
pub async fn insert_execution<'e, E>(
    executor: E,
    instance_id: i64,
    new: &NewExecution,
) -> AppResult<Execution>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"
        INSERT INTO procflow.node_execution (
            instance_id, node_id, executed_by, status, start_time, end_time,
            predicted_duration, actual_duration
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, ExecutionRow>(&sql)
        .bind(instance_id)
        .bind(&new.node_id)
        .bind(new.executed_by)
        .bind(new.status.as_str())
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(new.predicted_duration)
        .bind(new.actual_duration)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            conflict_on_unique(
                e,
                format!("Instance {} already has a running execution", instance_id),
            )
        })?;

    row.try_into()
}

pub async fn get_execution<'e, E>(executor: E, id: i64) -> AppResult<Option<Execution>>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {COLUMNS} FROM procflow.node_execution WHERE id = $1");
    let row = sqlx::query_as::<_, ExecutionRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.map(Execution::try_from).transpose()
}

pub async fn running_execution<'e, E>(
    executor: E,
    instance_id: i64,
) -> AppResult<Option<Execution>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM procflow.node_execution \
         WHERE instance_id = $1 AND status = 'Running'"
    );
    let row = sqlx::query_as::<_, ExecutionRow>(&sql)
        .bind(instance_id)
        .fetch_optional(executor)
        .await?;

    row.map(Execution::try_from).transpose()
}

/// Close a running execution. `None` when the row is missing or not `Running`.
pub async fn complete_execution<'e, E>(
    executor: E,
    id: i64,
    end_time: DateTime<Utc>,
    actual_duration: i64,
) -> AppResult<Option<Execution>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"
        UPDATE procflow.node_execution
        SET status = 'Completed', end_time = $2, actual_duration = $3
        WHERE id = $1 AND status = 'Running'
        RETURNING {COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, ExecutionRow>(&sql)
        .bind(id)
        .bind(end_time)
        .bind(actual_duration)
        .fetch_optional(executor)
        .await?;

    row.map(Execution::try_from).transpose()
}

/// Executions of the given instances, oldest first.
pub async fn list_for_instances<'e, E>(
    executor: E,
    instance_ids: &[i64],
) -> AppResult<Vec<Execution>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM procflow.node_execution \
         WHERE instance_id = ANY($1) ORDER BY id"
    );
    let rows = sqlx::query_as::<_, ExecutionRow>(&sql)
        .bind(instance_ids)
        .fetch_all(executor)
        .await?;

    convert(rows)
}

/// Completed executions with a measured duration, oldest first.
pub async fn list_completed<'e, E>(executor: E) -> AppResult<Vec<Execution>>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {COLUMNS} FROM procflow.node_execution \
         WHERE status = 'Completed' AND actual_duration IS NOT NULL ORDER BY id"
    );
    let rows = sqlx::query_as::<_, ExecutionRow>(&sql)
        .fetch_all(executor)
        .await?;

    convert(rows)
}
