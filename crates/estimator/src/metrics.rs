//! Accuracy scores and the comparative metrics report.

use serde::{Deserialize, Serialize};

/// Mean squared error. Zero for empty input.
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum::<f64>()
        / actual.len() as f64
}

/// Coefficient of determination.
///
/// With a constant target the score is 1.0 for a perfect fit and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean) * (a - mean)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Which of the two models a figure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Ensemble model, the one serving predictions
    RandomForest,
    /// Baseline model
    LinearRegression,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RandomForest => write!(f, "random_forest"),
            Self::LinearRegression => write!(f, "linear_regression"),
        }
    }
}

/// Held-out score of one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub mse: f64,
    pub r2: f64,
}

impl ModelScore {
    pub fn new(mse: f64, r2: f64) -> Self {
        Self { mse, r2 }
    }

    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            mse: mean_squared_error(actual, predicted),
            r2: r2_score(actual, predicted),
        }
    }

    /// `max(0, r2 * 100)` rounded to one decimal.
    pub fn accuracy_percent(&self) -> f64 {
        let pct = (self.r2 * 100.0).max(0.0);
        (pct * 10.0).round() / 10.0
    }

    pub fn is_finite(&self) -> bool {
        self.mse.is_finite() && self.r2.is_finite()
    }
}

/// Accuracy block of the metrics report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub random_forest: f64,
    pub linear_regression: f64,
    pub best_model: ModelKind,
}

/// Comparative metrics for both models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorMetrics {
    pub trained: bool,
    pub random_forest: ModelScore,
    pub linear_regression: ModelScore,
    pub accuracy: AccuracySummary,
}

impl EstimatorMetrics {
    /// Build the report. Ties on r2 go to the random forest.
    pub fn new(trained: bool, random_forest: ModelScore, linear_regression: ModelScore) -> Self {
        let best_model = if random_forest.r2 >= linear_regression.r2 {
            ModelKind::RandomForest
        } else {
            ModelKind::LinearRegression
        };
        Self {
            trained,
            random_forest,
            linear_regression,
            accuracy: AccuracySummary {
                random_forest: random_forest.accuracy_percent(),
                linear_regression: linear_regression.accuracy_percent(),
                best_model,
            },
        }
    }

    /// All-zero report for an untrained estimator.
    pub fn untrained() -> Self {
        Self::new(false, ModelScore::default(), ModelScore::default())
    }
}
