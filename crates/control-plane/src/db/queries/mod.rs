//! Query functions for the procflow tables.
//!
//! Functions take any `PgExecutor` so the store can run them against the
//! pool or inside a transaction.

pub mod execution;
pub mod instance;
pub mod system_log;
pub mod template;

use crate::error::AppError;

/// Map a unique-index violation onto `AppError::Conflict`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: impl Into<String>) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::Conflict(message.into());
        }
    }
    err.into()
}
