//! Ridge regression reference oracle.
//!
//! A deterministic, dependency-free [`EnergyOracle`] used by the CLI and the
//! test suite. Production deployments typically swap in a gradient-boosting
//! model behind the same trait; nothing downstream of the adapter can tell
//! the difference.
//!
//! ## Categorical encoding convention
//!
//! Each categorical column is encoded as the f64 index of its level in a
//! vocabulary learned at fit time (first-occurrence order). Levels unseen at
//! predict time map to one reserved index immediately past the learned
//! vocabulary. The convention is identical between fit and predict.

use super::{check_schema, EnergyOracle, OracleError};
use crate::types::{FeatureFrame, FeatureSchema};
use tracing::info;

/// Floor below which a column is treated as constant and left unscaled.
const STD_FLOOR: f64 = 1e-12;

/// Pivot magnitude below which the normal equations are declared degenerate.
const PIVOT_FLOOR: f64 = 1e-10;

/// Linear least squares with L2 damping, solved on the normal equations.
pub struct RidgeOracle {
    l2_penalty: f64,
    fitted: Option<Fitted>,
}

/// State recorded at fit time. The schema and feature-name list are the
/// persisted contract; means/stds/vocabularies make predict-time encoding
/// identical to fit-time encoding.
struct Fitted {
    schema: FeatureSchema,
    feature_names: Vec<String>,
    /// Level vocabulary per categorical column, first-occurrence order
    vocabularies: Vec<Vec<String>>,
    /// Per encoded column, for standardization
    means: Vec<f64>,
    stds: Vec<f64>,
    /// One weight per encoded column (on standardized scale)
    weights: Vec<f64>,
    /// Mean of the training target; the intercept after centering
    target_mean: f64,
}

impl RidgeOracle {
    /// Create an unfitted oracle with the given L2 damping.
    pub fn new(l2_penalty: f64) -> Self {
        Self {
            l2_penalty,
            fitted: None,
        }
    }

    /// Encode the frame into column-major numeric form using the given
    /// vocabularies: numeric columns pass through, categorical columns become
    /// level indices (unseen level -> vocabulary length).
    fn encode(frame: &FeatureFrame, vocabularies: &[Vec<String>]) -> Vec<Vec<f64>> {
        let mut columns: Vec<Vec<f64>> = frame.numeric.clone();
        for (col, vocab) in frame.categorical.iter().zip(vocabularies) {
            columns.push(
                col.iter()
                    .map(|level| {
                        vocab
                            .iter()
                            .position(|v| v == level)
                            .unwrap_or(vocab.len()) as f64
                    })
                    .collect(),
            );
        }
        columns
    }

    /// Learn one vocabulary per categorical column, first-occurrence order.
    fn learn_vocabularies(frame: &FeatureFrame) -> Vec<Vec<String>> {
        frame
            .categorical
            .iter()
            .map(|col| {
                let mut vocab: Vec<String> = Vec::new();
                for level in col {
                    if !vocab.contains(level) {
                        vocab.push(level.clone());
                    }
                }
                vocab
            })
            .collect()
    }
}

impl EnergyOracle for RidgeOracle {
    fn fit(&mut self, frame: &FeatureFrame) -> Result<(), OracleError> {
        if frame.is_empty() {
            return Err(OracleError::EmptyTrainingSet);
        }

        let n = frame.len();
        let vocabularies = Self::learn_vocabularies(frame);
        let raw = Self::encode(frame, &vocabularies);
        let p = raw.len();

        // Standardize columns; constant columns get weight 0 through centering
        let mut means = Vec::with_capacity(p);
        let mut stds = Vec::with_capacity(p);
        let mut z: Vec<Vec<f64>> = Vec::with_capacity(p);
        for col in &raw {
            let mean = col.iter().sum::<f64>() / n as f64;
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            let std = var.sqrt();
            let scale = if std < STD_FLOOR { 1.0 } else { std };
            means.push(mean);
            stds.push(scale);
            z.push(col.iter().map(|v| (v - mean) / scale).collect());
        }

        let target_mean = frame.target.iter().sum::<f64>() / n as f64;
        let y_centered: Vec<f64> = frame.target.iter().map(|y| y - target_mean).collect();

        // Normal equations: (ZᵀZ + λI) w = Zᵀy
        let mut a = vec![vec![0.0; p]; p];
        let mut b = vec![0.0; p];
        for i in 0..p {
            for j in i..p {
                let dot: f64 = z[i].iter().zip(&z[j]).map(|(u, v)| u * v).sum();
                a[i][j] = dot;
                a[j][i] = dot;
            }
            a[i][i] += self.l2_penalty;
            b[i] = z[i].iter().zip(&y_centered).map(|(u, y)| u * y).sum();
        }

        let weights = solve(a, b)?;

        info!(
            train_rows = n,
            columns = p,
            l2_penalty = self.l2_penalty,
            "Ridge oracle fitted"
        );

        self.fitted = Some(Fitted {
            feature_names: frame.schema.column_names(),
            schema: frame.schema.clone(),
            vocabularies,
            means,
            stds,
            weights,
            target_mean,
        });
        Ok(())
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, OracleError> {
        let fitted = self.fitted.as_ref().ok_or(OracleError::NotFitted)?;

        // Contract check comes first; no prediction is computed on mismatch
        check_schema(&fitted.schema, &frame.schema)?;

        let raw = Self::encode(frame, &fitted.vocabularies);
        let mut predictions = vec![fitted.target_mean; frame.len()];
        for (c, col) in raw.iter().enumerate() {
            let (mean, std, w) = (fitted.means[c], fitted.stds[c], fitted.weights[c]);
            for (pred, v) in predictions.iter_mut().zip(col) {
                *pred += w * (v - mean) / std;
            }
        }
        Ok(predictions)
    }

    fn feature_names(&self) -> &[String] {
        match &self.fitted {
            Some(f) => &f.feature_names,
            None => &[],
        }
    }
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, OracleError> {
    let p = b.len();
    for col in 0..p {
        // Partial pivot
        let mut pivot_row = col;
        for row in (col + 1)..p {
            if a[row][col].abs() > a[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        if a[pivot_row][col].abs() < PIVOT_FLOOR {
            return Err(OracleError::Underdetermined(col));
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..p {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..p {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    // Back-substitution
    let mut x = vec![0.0; p];
    for col in (0..p).rev() {
        let tail: f64 = ((col + 1)..p).map(|k| a[col][k] * x[k]).sum();
        x[col] = (b[col] - tail) / a[col][col];
    }
    Ok(x)
}
