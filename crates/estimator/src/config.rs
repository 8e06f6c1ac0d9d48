//! Estimator configuration.

use serde::Deserialize;

use crate::error::TrainingError;

/// Tunables for the duration estimator.
///
/// Deserializable so the server can load it with `envy`
/// (`PROCFLOW_ESTIMATOR_MIN_SAMPLES`, `PROCFLOW_ESTIMATOR_SEED`, ...).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EstimatorConfig {
    /// Below this many completed executions the synthetic dataset is used
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Prediction returned while untrained, in seconds
    #[serde(default = "default_prediction_secs")]
    pub default_prediction_secs: i64,

    /// Modulus applied to the node id hash
    #[serde(default = "default_node_code_modulus")]
    pub node_code_modulus: u64,

    /// Number of trees in the random forest
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Seed for the train/test shuffle and the bootstrap samples
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Share of history held out for scoring
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    /// Minimum rows a tree node needs before it may split
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,

    /// Depth limit for each tree (unbounded when unset)
    #[serde(default)]
    pub max_depth: Option<usize>,
}

fn default_min_samples() -> usize {
    10
}

fn default_prediction_secs() -> i64 {
    300
}

fn default_node_code_modulus() -> u64 {
    1000
}

fn default_n_estimators() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_min_samples_split() -> usize {
    2
}

impl EstimatorConfig {
    /// Check value ranges before a training pass.
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.node_code_modulus == 0 {
            return Err(TrainingError::InvalidConfig(
                "node_code_modulus must be positive".to_string(),
            ));
        }
        if self.n_estimators == 0 {
            return Err(TrainingError::InvalidConfig(
                "n_estimators must be positive".to_string(),
            ));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(TrainingError::InvalidConfig(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.min_samples_split < 2 {
            return Err(TrainingError::InvalidConfig(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            default_prediction_secs: default_prediction_secs(),
            node_code_modulus: default_node_code_modulus(),
            n_estimators: default_n_estimators(),
            seed: default_seed(),
            test_fraction: default_test_fraction(),
            min_samples_split: default_min_samples_split(),
            max_depth: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EstimatorConfig::default();
        assert_eq!(config.min_samples, 10);
        assert_eq!(config.default_prediction_secs, 300);
        assert_eq!(config.node_code_modulus, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_test_fraction() {
        let config = EstimatorConfig {
            test_fraction: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TrainingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: EstimatorConfig =
            serde_json::from_str(r#"{"n_estimators": 10, "max_depth": 4}"#).unwrap();
        assert_eq!(config.n_estimators, 10);
        assert_eq!(config.max_depth, Some(4));
        assert_eq!(config.seed, 42);
    }
}
