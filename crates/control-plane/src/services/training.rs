//! Background retraining of the duration estimator.
//!
//! Completing a node schedules a retrain; the fit runs on the blocking pool
//! so request handlers never wait for it. Requests that arrive while a fit
//! is in flight collapse into one follow-up run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use procflow_estimator::{DurationEstimator, TrainingError, TrainingReport};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::services::tracker::ExecutionTracker;

/// Why a training pass did not produce a model.
#[derive(Debug, Error)]
pub enum TrainingFailure {
    #[error("loading training history failed: {0}")]
    History(#[source] AppError),

    #[error("model fit failed: {0}")]
    Fit(#[from] TrainingError),

    #[error("training task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Default)]
struct Flags {
    running: AtomicBool,
    rerun: AtomicBool,
}

#[derive(Clone)]
pub struct Retrainer {
    estimator: Arc<DurationEstimator>,
    tracker: ExecutionTracker,
    flags: Arc<Flags>,
}

impl Retrainer {
    pub fn new(estimator: Arc<DurationEstimator>, tracker: ExecutionTracker) -> Self {
        Self {
            estimator,
            tracker,
            flags: Arc::new(Flags::default()),
        }
    }

    pub fn estimator(&self) -> &Arc<DurationEstimator> {
        &self.estimator
    }

    /// Request a retrain in the background.
    ///
    /// Returns the handle of the spawned task, or `None` when a task is
    /// already running and will pick this request up.
    pub fn schedule(&self) -> Option<JoinHandle<()>> {
        self.flags.rerun.store(true, Ordering::SeqCst);
        if self.flags.running.swap(true, Ordering::SeqCst) {
            tracing::debug!("Retrain already in flight, coalescing request");
            return None;
        }

        let this = self.clone();
        Some(tokio::spawn(async move {
            loop {
                this.flags.rerun.store(false, Ordering::SeqCst);
                match this.train_once().await {
                    Ok(report) => log_report(&report),
                    Err(e) => tracing::warn!(error = %e, "Background retrain failed"),
                }
                this.flags.running.store(false, Ordering::SeqCst);

                if !this.flags.rerun.load(Ordering::SeqCst)
                    || this.flags.running.swap(true, Ordering::SeqCst)
                {
                    break;
                }
            }
        }))
    }

    /// Load the completed history and fit both models once.
    pub async fn train_once(&self) -> Result<TrainingReport, TrainingFailure> {
        let samples = self
            .tracker
            .history()
            .await
            .map_err(TrainingFailure::History)?;

        let estimator = self.estimator.clone();
        let report = tokio::task::spawn_blocking(move || estimator.train(&samples)).await??;
        Ok(report)
    }

    /// Train now unless a model is already in place.
    pub async fn ensure_trained(&self) {
        if self.estimator.is_trained() {
            return;
        }
        match self.train_once().await {
            Ok(report) => log_report(&report),
            Err(e) => tracing::warn!(error = %e, "On-demand training failed"),
        }
    }
}

fn log_report(report: &TrainingReport) {
    tracing::info!(
        source = ?report.source,
        samples = report.samples,
        rf_mse = report.random_forest.mse,
        lr_mse = report.linear_regression.mse,
        "Estimator refreshed"
    );
}
