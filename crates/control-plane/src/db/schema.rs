//! DDL for the `procflow` schema.
//!
//! Every statement is idempotent, so the script runs at each startup of the
//! PostgreSQL store and again from `POST /api/db/init`.

use crate::db::DbPool;
use crate::error::AppResult;

/// Tables owned by the control plane.
pub const TABLES: [&str; 4] = [
    "workflow_template",
    "workflow_instance",
    "node_execution",
    "system_log",
];

pub const SCHEMA_SQL: &str = r#"
CREATE SCHEMA IF NOT EXISTS procflow;

CREATE TABLE IF NOT EXISTS procflow.workflow_template (
    id          BIGSERIAL PRIMARY KEY,
    name        TEXT        NOT NULL,
    version     INTEGER     NOT NULL DEFAULT 1,
    nodes       JSONB       NOT NULL,
    is_deleted  BOOLEAN     NOT NULL DEFAULT FALSE,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS workflow_template_name_idx
    ON procflow.workflow_template (name);

CREATE TABLE IF NOT EXISTS procflow.workflow_instance (
    id              BIGSERIAL PRIMARY KEY,
    template_id     BIGINT      NOT NULL REFERENCES procflow.workflow_template (id),
    current_node_id TEXT,
    status          TEXT        NOT NULL
        CHECK (status IN ('Running', 'Completed', 'Terminated')),
    start_time      TIMESTAMPTZ NOT NULL,
    end_time        TIMESTAMPTZ,
    CONSTRAINT workflow_instance_current_node_chk
        CHECK ((status = 'Running') = (current_node_id IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS procflow.node_execution (
    id                 BIGSERIAL PRIMARY KEY,
    instance_id        BIGINT      NOT NULL REFERENCES procflow.workflow_instance (id),
    node_id            TEXT        NOT NULL,
    executed_by        BIGINT,
    status             TEXT        NOT NULL
        CHECK (status IN ('Pending', 'Running', 'Completed')),
    start_time         TIMESTAMPTZ NOT NULL,
    end_time           TIMESTAMPTZ,
    predicted_duration BIGINT,
    actual_duration    BIGINT
);

CREATE INDEX IF NOT EXISTS node_execution_instance_idx
    ON procflow.node_execution (instance_id);

CREATE UNIQUE INDEX IF NOT EXISTS node_execution_one_running
    ON procflow.node_execution (instance_id)
    WHERE status = 'Running';

CREATE TABLE IF NOT EXISTS procflow.system_log (
    id          BIGSERIAL PRIMARY KEY,
    user_id     BIGINT,
    action      TEXT        NOT NULL,
    details     TEXT,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS system_log_created_idx
    ON procflow.system_log (created_at DESC);
"#;

/// Apply [`SCHEMA_SQL`].
pub async fn apply_schema(pool: &DbPool) -> AppResult<()> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    tracing::info!("procflow schema applied");
    Ok(())
}
