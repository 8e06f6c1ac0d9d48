//! Ordinary least squares baseline.

use crate::error::TrainingError;
use crate::features::{Dataset, Features, FEATURE_COUNT};

/// Relative ridge term keeping the normal equations solvable when a
/// feature is constant or two features are collinear.
const RIDGE_SCALE: f64 = 1e-10;

/// Linear model `y = intercept + coefficients . x`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearRegression {
    intercept: f64,
    coefficients: Features,
}

impl LinearRegression {
    /// Fit by solving the normal equations on mean-centred data.
    pub fn fit(data: &Dataset) -> Result<Self, TrainingError> {
        if data.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        let n = data.len() as f64;

        let mut mean_x = [0.0; FEATURE_COUNT];
        for row in &data.features {
            for (m, v) in mean_x.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mean_y = data.targets.iter().sum::<f64>() / n;

        let mut gram = [[0.0; FEATURE_COUNT]; FEATURE_COUNT];
        let mut rhs = [0.0; FEATURE_COUNT];
        for (row, y) in data.features.iter().zip(&data.targets) {
            let dy = y - mean_y;
            for i in 0..FEATURE_COUNT {
                let di = row[i] - mean_x[i];
                rhs[i] += di * dy;
                for j in 0..FEATURE_COUNT {
                    gram[i][j] += di * (row[j] - mean_x[j]);
                }
            }
        }

        let trace: f64 = (0..FEATURE_COUNT).map(|i| gram[i][i]).sum();
        let ridge = RIDGE_SCALE * trace.max(1.0);
        for (i, row) in gram.iter_mut().enumerate() {
            row[i] += ridge;
        }

        let coefficients = solve(gram, rhs).ok_or(TrainingError::NonFinite)?;
        let intercept = mean_y - dot(&coefficients, &mean_x);

        if !intercept.is_finite() {
            return Err(TrainingError::NonFinite);
        }

        Ok(Self {
            intercept,
            coefficients,
        })
    }

    pub fn predict(&self, x: &Features) -> f64 {
        self.intercept + dot(&self.coefficients, x)
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &Features {
        &self.coefficients
    }
}

fn dot(a: &Features, b: &Features) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gaussian elimination with partial pivoting.
fn solve(
    mut a: [[f64; FEATURE_COUNT]; FEATURE_COUNT],
    mut b: [f64; FEATURE_COUNT],
) -> Option<Features> {
    for col in 0..FEATURE_COUNT {
        let pivot = (col..FEATURE_COUNT)
            .max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot][col] == 0.0 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..FEATURE_COUNT {
            let factor = a[row][col] / a[col][col];
            for k in col..FEATURE_COUNT {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; FEATURE_COUNT];
    for row in (0..FEATURE_COUNT).rev() {
        let tail: f64 = (row + 1..FEATURE_COUNT).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}
