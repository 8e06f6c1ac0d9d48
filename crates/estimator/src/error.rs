//! Error types for model training.

use thiserror::Error;

/// Reasons a training pass can fail.
///
/// A failed pass never replaces the models that are already being served.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrainingError {
    /// No rows to fit on
    #[error("training dataset is empty")]
    EmptyDataset,

    /// Too few rows to build a train/test split
    #[error("need at least {required} samples, got {actual}")]
    InsufficientSamples { required: usize, actual: usize },

    /// A history record that cannot be used as a training row
    #[error("invalid sample for node '{node_id}': {reason}")]
    InvalidSample { node_id: String, reason: String },

    /// Estimator configuration out of range
    #[error("invalid estimator configuration: {0}")]
    InvalidConfig(String),

    /// Fitted parameters or scores were NaN/infinite
    #[error("model fit produced non-finite values")]
    NonFinite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_samples_message() {
        let err = TrainingError::InsufficientSamples {
            required: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "need at least 2 samples, got 1");
    }

    #[test]
    fn test_invalid_sample_message() {
        let err = TrainingError::InvalidSample {
            node_id: "Review".to_string(),
            reason: "negative duration".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid sample for node 'Review': negative duration"
        );
    }
}
