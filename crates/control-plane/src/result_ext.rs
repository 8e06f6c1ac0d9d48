//! Logging helpers for results and options whose failure is reported but
//! not propagated (audit writes, background training, template lookups).
//!
//! Each entry carries the caller's `file:line` through `#[track_caller]`.

use std::fmt::Display;
use std::panic::Location;

fn location(caller: &Location<'_>) -> String {
    format!("{}:{}", caller.file(), caller.line())
}

pub trait ResultExt<T, E> {
    /// Log an `Err` at error level and hand the result back unchanged.
    ///
    /// ```ignore
    /// use procflow_control_plane::result_ext::ResultExt;
    ///
    /// let stored = store.append_log(entry).await.log("recording audit entry")?;
    /// ```
    fn log<S: Display>(self, context: S) -> Result<T, E>;

    /// Log an `Err` at error level and continue without it.
    fn ok_logged<S: Display>(self, context: S) -> Option<T>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log<S: Display>(self, context: S) -> Result<T, E> {
        if let Err(e) = &self {
            tracing::error!(
                target: "procflow_control_plane",
                error = %e,
                file = %location(Location::caller()),
                context = %context,
                "Operation failed"
            );
        }
        self
    }

    #[track_caller]
    fn ok_logged<S: Display>(self, context: S) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(
                    target: "procflow_control_plane",
                    error = %e,
                    file = %location(Location::caller()),
                    context = %context,
                    "Operation failed, continuing"
                );
                None
            }
        }
    }
}

pub trait OptionExt<T> {
    /// Warn when the value is missing.
    fn log_none<S: Display>(self, context: S) -> Option<T>;
}

impl<T> OptionExt<T> for Option<T> {
    #[track_caller]
    fn log_none<S: Display>(self, context: S) -> Option<T> {
        if self.is_none() {
            tracing::warn!(
                target: "procflow_control_plane",
                file = %location(Location::caller()),
                context = %context,
                "Expected value was missing"
            );
        }
        self
    }
}
