//! The duration estimator service.
//!
//! Holds a random forest (serves predictions) and a linear baseline (kept for
//! comparison) behind a read-write lock. Each training pass fits a fresh pair
//! of models and swaps them in as one `Arc`, so readers see either the old
//! pair or the new one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EstimatorConfig;
use crate::error::TrainingError;
use crate::features::{encode, train_test_split, Dataset, ExecutionSample};
use crate::forest::{ForestParams, RandomForest};
use crate::linear::LinearRegression;
use crate::metrics::{EstimatorMetrics, ModelScore};

/// Metrics reported after a cold-start (synthetic) fit.
pub const SYNTHETIC_FOREST_SCORE: ModelScore = ModelScore {
    mse: 120.5,
    r2: 0.85,
};
pub const SYNTHETIC_LINEAR_SCORE: ModelScore = ModelScore {
    mse: 350.2,
    r2: 0.65,
};

/// Where the last fit's rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingSource {
    /// Not enough history; fitted on the built-in dataset
    Synthetic,
    /// Fitted on completed executions
    History,
}

/// Outcome of a successful training pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub source: TrainingSource,
    pub samples: usize,
    pub random_forest: ModelScore,
    pub linear_regression: ModelScore,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug)]
struct TrainedModels {
    forest: RandomForest,
    linear: LinearRegression,
    report: TrainingReport,
}

/// Dual-model duration estimator.
#[derive(Debug)]
pub struct DurationEstimator {
    config: EstimatorConfig,
    models: RwLock<Option<Arc<TrainedModels>>>,
}

impl Default for DurationEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

impl DurationEstimator {
    /// Create an untrained estimator.
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            models: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.models.read().is_some()
    }

    /// Report of the models currently being served.
    pub fn last_report(&self) -> Option<TrainingReport> {
        self.snapshot().map(|m| m.report)
    }

    /// Refit both models from scratch.
    ///
    /// With fewer than `min_samples` records the built-in synthetic dataset is
    /// used and fixed metrics are reported. On error the currently served
    /// models are left untouched.
    pub fn train(&self, history: &[ExecutionSample]) -> Result<TrainingReport, TrainingError> {
        self.config.validate()?;

        let models = if history.len() < self.config.min_samples {
            warn!(
                samples = history.len(),
                min_samples = self.config.min_samples,
                "Not enough history to train, using synthetic dataset"
            );
            self.fit_synthetic()?
        } else {
            self.fit_history(history)?
        };

        let report = models.report;
        *self.models.write() = Some(Arc::new(models));

        info!(
            source = ?report.source,
            samples = report.samples,
            forest_r2 = report.random_forest.r2,
            linear_r2 = report.linear_regression.r2,
            "Duration models trained"
        );

        Ok(report)
    }

    /// Expected duration in seconds for a node visit.
    ///
    /// Returns `default_prediction_secs` until the first successful training.
    /// A non-finite forest estimate falls back to the linear baseline, then
    /// to the default.
    pub fn predict(&self, node_id: &str, executor_id: Option<i64>, at: DateTime<Utc>) -> i64 {
        let Some(models) = self.snapshot() else {
            return self.config.default_prediction_secs;
        };

        let x = encode(node_id, executor_id, at, self.config.node_code_modulus);
        let estimate = models.forest.predict(&x);
        if estimate.is_finite() {
            debug!(node_id, estimate, "Predicted node duration");
            return estimate.round() as i64;
        }

        let baseline = models.linear.predict(&x);
        if baseline.is_finite() {
            warn!(node_id, baseline, "Using linear baseline");
            return baseline.round() as i64;
        }
        warn!(node_id, "Non-finite duration estimate, using default");
        self.config.default_prediction_secs
    }

    /// Linear model estimate for the same inputs, `None` while untrained or
    /// when the fit produces no finite value.
    pub fn predict_baseline(
        &self,
        node_id: &str,
        executor_id: Option<i64>,
        at: DateTime<Utc>,
    ) -> Option<i64> {
        let models = self.snapshot()?;
        let x = encode(node_id, executor_id, at, self.config.node_code_modulus);
        let estimate = models.linear.predict(&x);
        estimate.is_finite().then(|| estimate.round() as i64)
    }

    /// Comparative metrics for both models; all zero while untrained.
    pub fn metrics(&self) -> EstimatorMetrics {
        match self.snapshot() {
            Some(models) => EstimatorMetrics::new(
                true,
                models.report.random_forest,
                models.report.linear_regression,
            ),
            None => EstimatorMetrics::untrained(),
        }
    }

    fn snapshot(&self) -> Option<Arc<TrainedModels>> {
        self.models.read().clone()
    }

    fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.config.n_estimators,
            min_samples_split: self.config.min_samples_split,
            max_depth: self.config.max_depth,
            seed: self.config.seed,
        }
    }

    fn fit_synthetic(&self) -> Result<TrainedModels, TrainingError> {
        let data = Dataset::synthetic();
        let forest = RandomForest::fit(&data, &self.forest_params())?;
        let linear = LinearRegression::fit(&data)?;

        Ok(TrainedModels {
            forest,
            linear,
            report: TrainingReport {
                source: TrainingSource::Synthetic,
                samples: data.len(),
                random_forest: SYNTHETIC_FOREST_SCORE,
                linear_regression: SYNTHETIC_LINEAR_SCORE,
                trained_at: Utc::now(),
            },
        })
    }

    fn fit_history(&self, history: &[ExecutionSample]) -> Result<TrainedModels, TrainingError> {
        if history.len() < 2 {
            return Err(TrainingError::InsufficientSamples {
                required: 2,
                actual: history.len(),
            });
        }
        if let Some(bad) = history.iter().find(|s| s.actual_duration < 0) {
            return Err(TrainingError::InvalidSample {
                node_id: bad.node_id.clone(),
                reason: format!("negative duration {}", bad.actual_duration),
            });
        }

        let data = Dataset::from_samples(history, self.config.node_code_modulus);
        let (train_rows, test_rows) =
            train_test_split(data.len(), self.config.test_fraction, self.config.seed);
        let train = data.subset(&train_rows);
        let test = data.subset(&test_rows);

        let forest = RandomForest::fit(&train, &self.forest_params())?;
        let linear = LinearRegression::fit(&train)?;

        let forest_pred: Vec<f64> = test.features.iter().map(|x| forest.predict(x)).collect();
        let linear_pred: Vec<f64> = test.features.iter().map(|x| linear.predict(x)).collect();

        let random_forest = ModelScore::evaluate(&test.targets, &forest_pred);
        let linear_regression = ModelScore::evaluate(&test.targets, &linear_pred);
        if !random_forest.is_finite() || !linear_regression.is_finite() {
            return Err(TrainingError::NonFinite);
        }

        Ok(TrainedModels {
            forest,
            linear,
            report: TrainingReport {
                source: TrainingSource::History,
                samples: history.len(),
                random_forest,
                linear_regression,
                trained_at: Utc::now(),
            },
        })
    }
}
