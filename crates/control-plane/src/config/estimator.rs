//! Duration estimator settings.

use procflow_estimator::EstimatorConfig;

/// Load estimator tunables from `PROCFLOW_ESTIMATOR_*` variables.
///
/// - `PROCFLOW_ESTIMATOR_MIN_SAMPLES` (default: 10)
/// - `PROCFLOW_ESTIMATOR_DEFAULT_PREDICTION_SECS` (default: 300)
/// - `PROCFLOW_ESTIMATOR_NODE_CODE_MODULUS` (default: 1000)
/// - `PROCFLOW_ESTIMATOR_N_ESTIMATORS` (default: 100)
/// - `PROCFLOW_ESTIMATOR_SEED` (default: 42)
/// - `PROCFLOW_ESTIMATOR_TEST_FRACTION` (default: 0.2)
/// - `PROCFLOW_ESTIMATOR_MIN_SAMPLES_SPLIT` (default: 2)
/// - `PROCFLOW_ESTIMATOR_MAX_DEPTH` (unbounded when unset)
pub fn estimator_config_from_env() -> Result<EstimatorConfig, envy::Error> {
    envy::prefixed("PROCFLOW_ESTIMATOR_").from_env::<EstimatorConfig>()
}
