//! Feature encoding for duration samples.
//!
//! Each sample becomes `(node_code, executor_id, hour_of_day)`. The node code
//! is a hash folded into `[0, modulus)`, so distinct node ids may collide;
//! models treat colliding nodes as the same category.

use chrono::{DateTime, Timelike, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of input features.
pub const FEATURE_COUNT: usize = 3;

/// One encoded row.
pub type Features = [f64; FEATURE_COUNT];

/// A completed execution usable as a training record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSample {
    pub node_id: String,
    pub executor_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    /// Observed duration in seconds
    pub actual_duration: i64,
}

/// Fold a node id into `[0, modulus)`.
///
/// Uses the first eight bytes of its SHA-256 digest so the code is stable
/// across processes and restarts.
pub fn node_code(node_id: &str, modulus: u64) -> u64 {
    let digest = Sha256::digest(node_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % modulus.max(1)
}

/// Encode a (node, executor, time) triple.
///
/// A missing executor is encoded as 0. The hour is taken in UTC.
pub fn encode(
    node_id: &str,
    executor_id: Option<i64>,
    at: DateTime<Utc>,
    modulus: u64,
) -> Features {
    [
        node_code(node_id, modulus) as f64,
        executor_id.unwrap_or(0) as f64,
        at.hour() as f64,
    ]
}

/// Encoded rows plus their targets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub features: Vec<Features>,
    pub targets: Vec<f64>,
}

impl Dataset {
    pub fn new(features: Vec<Features>, targets: Vec<f64>) -> Self {
        debug_assert_eq!(features.len(), targets.len());
        Self { features, targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Rows at the given positions, in that order.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i]).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Build a dataset from history records.
    pub fn from_samples(samples: &[ExecutionSample], modulus: u64) -> Dataset {
        let features = samples
            .iter()
            .map(|s| encode(&s.node_id, s.executor_id, s.started_at, modulus))
            .collect();
        let targets = samples.iter().map(|s| s.actual_duration as f64).collect();
        Dataset { features, targets }
    }

    /// Fixed cold-start dataset used when there is not enough history.
    pub fn synthetic() -> Dataset {
        let features = vec![
            [1.0, 1.0, 9.0],
            [1.0, 1.0, 10.0],
            [2.0, 1.0, 9.0],
            [2.0, 1.0, 14.0],
            [3.0, 2.0, 10.0],
            [1.0, 1.0, 9.0],
            [1.0, 1.0, 10.0],
            [2.0, 1.0, 9.0],
            [2.0, 1.0, 14.0],
            [3.0, 2.0, 10.0],
        ];
        let targets = vec![
            300.0, 310.0, 400.0, 420.0, 200.0, 305.0, 315.0, 390.0, 410.0, 210.0,
        ];
        Dataset { features, targets }
    }
}

/// Shuffle `0..len` with a fixed seed and cut off the test share.
///
/// The test side gets `ceil(len * test_fraction)` rows, clamped so both
/// sides keep at least one row. Returns `(train, test)`.
pub fn train_test_split(len: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..len).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_len = ((len as f64) * test_fraction).ceil() as usize;
    let test_len = test_len.clamp(1, len.saturating_sub(1).max(1));

    let test = indices[..test_len.min(len)].to_vec();
    let train = indices[test_len.min(len)..].to_vec();
    (train, test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_node_code_is_stable_and_bounded() {
        let a = node_code("Manager Approval", 1000);
        let b = node_code("Manager Approval", 1000);
        assert_eq!(a, b);
        assert!(a < 1000);
        assert!(node_code("anything", 7) < 7);
    }

    #[test]
    fn test_encode_uses_hour_and_zero_executor() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        let row = encode("Draft", None, at, 1000);
        assert_eq!(row[1], 0.0);
        assert_eq!(row[2], 14.0);
        assert_eq!(row[0], node_code("Draft", 1000) as f64);
    }

    #[test]
    fn test_split_sizes() {
        let (train, test) = train_test_split(12, 0.2, 42);
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 9);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        assert_eq!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 42));
    }

    #[test]
    fn test_synthetic_dataset_shape() {
        let data = Dataset::synthetic();
        assert_eq!(data.len(), 10);
        assert_eq!(data.features.len(), 10);
    }
}
