//! Template queries.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgExecutor};

use crate::db::models::{Template, TemplateNode};
use crate::error::AppResult;

#[derive(Debug, FromRow)]
struct TemplateRow {
    id: i64,
    name: String,
    version: i32,
    nodes: Json<Vec<TemplateNode>>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Template {
            id: row.id,
            name: row.name,
            version: row.version,
            nodes: row.nodes.0,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
        }
    }
}

pub async fn insert_template<'e, E>(
    executor: E,
    name: &str,
    nodes: &[TemplateNode],
    created_at: DateTime<Utc>,
) -> AppResult<Template>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        INSERT INTO procflow.workflow_template (name, version, nodes, is_deleted, created_at)
        VALUES ($1, 1, $2, FALSE, $3)
        RETURNING id, name, version, nodes, is_deleted, created_at
        "#,
    )
    .bind(name)
    .bind(Json(nodes))
    .bind(created_at)
    .fetch_one(executor)
    .await?;

    Ok(row.into())
}

/// Get a template by ID, soft-deleted ones included.
pub async fn get_template<'e, E>(executor: E, id: i64) -> AppResult<Option<Template>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, name, version, nodes, is_deleted, created_at
        FROM procflow.workflow_template
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Template::from))
}

/// Oldest live template with this name.
pub async fn find_template_by_name<'e, E>(executor: E, name: &str) -> AppResult<Option<Template>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, name, version, nodes, is_deleted, created_at
        FROM procflow.workflow_template
        WHERE name = $1 AND NOT is_deleted
        ORDER BY id
        LIMIT 1
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Template::from))
}

/// Replace name and nodes of a live template and bump its version.
pub async fn update_template<'e, E>(
    executor: E,
    id: i64,
    name: &str,
    nodes: &[TemplateNode],
) -> AppResult<Option<Template>>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        UPDATE procflow.workflow_template
        SET name = $2, nodes = $3, version = version + 1
        WHERE id = $1 AND NOT is_deleted
        RETURNING id, name, version, nodes, is_deleted, created_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(Json(nodes))
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Template::from))
}

/// Set the delete flag. Returns `false` when no row has this ID.
pub async fn soft_delete_template<'e, E>(executor: E, id: i64) -> AppResult<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE procflow.workflow_template
        SET is_deleted = TRUE
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_templates<'e, E>(executor: E) -> AppResult<Vec<Template>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, name, version, nodes, is_deleted, created_at
        FROM procflow.workflow_template
        WHERE NOT is_deleted
        ORDER BY id
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Template::from).collect())
}
