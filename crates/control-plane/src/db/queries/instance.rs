//! Instance queries.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor};

use crate::db::models::{Instance, InstanceCounts, NewInstance};
use crate::error::{AppError, AppResult};

#[derive(Debug, FromRow)]
struct InstanceRow {
    id: i64,
    template_id: i64,
    current_node_id: Option<String>,
    status: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl TryFrom<InstanceRow> for Instance {
    type Error = AppError;

    fn try_from(row: InstanceRow) -> Result<Self, Self::Error> {
        Ok(Instance {
            id: row.id,
            template_id: row.template_id,
            current_node_id: row.current_node_id,
            status: row.status.parse()?,
            start_time: row.start_time,
            end_time: row.end_time,
        })
    }
}

pub async fn insert_instance<'e, E>(executor: E, new: &NewInstance) -> AppResult<Instance>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, InstanceRow>(
        r#"
        INSERT INTO procflow.workflow_instance (
            template_id, current_node_id, status, start_time, end_time
        )
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, template_id, current_node_id, status, start_time, end_time
        "#,
    )
    .bind(new.template_id)
    .bind(&new.current_node_id)
    .bind(new.status.as_str())
    .bind(new.start_time)
    .bind(new.end_time)
    .fetch_one(executor)
    .await?;

    row.try_into()
}

pub async fn get_instance<'e, E>(executor: E, id: i64) -> AppResult<Option<Instance>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, InstanceRow>(
        r#"
        SELECT id, template_id, current_node_id, status, start_time, end_time
        FROM procflow.workflow_instance
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(Instance::try_from).transpose()
}

pub async fn list_instances<'e, E>(executor: E) -> AppResult<Vec<Instance>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, InstanceRow>(
        r#"
        SELECT id, template_id, current_node_id, status, start_time, end_time
        FROM procflow.workflow_instance
        ORDER BY id
        "#,
    )
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Instance::try_from).collect()
}

/// Write the mutable columns of an instance. Returns `false` when the row is gone.
pub async fn update_instance<'e, E>(executor: E, instance: &Instance) -> AppResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE procflow.workflow_instance
        SET current_node_id = $2, status = $3, end_time = $4
        WHERE id = $1
        "#,
    )
    .bind(instance.id)
    .bind(&instance.current_node_id)
    .bind(instance.status.as_str())
    .bind(instance.end_time)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_instances<'e, E>(executor: E) -> AppResult<InstanceCounts>
where
    E: PgExecutor<'e>,
{
    let (total, active): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'Running')
        FROM procflow.workflow_instance
        "#,
    )
    .fetch_one(executor)
    .await?;

    Ok(InstanceCounts { total, active })
}
