//! End-to-end detection pipeline.
//!
//! Orchestrates the full batch run:
//!
//! 1. Build the entity-grouped feature frame
//! 2. Temporal split; fit the oracle on the training prefix
//! 3. Evaluate RMSE/MAE over the evaluation suffix
//! 4. Predict the FULL frame (the "virtual meter")
//! 5. Score residuals against per-building dynamic thresholds
//! 6. Quantify waste and rank the report
//!
//! The run is single-pass and synchronous; it either completes
//! deterministically or fails fast on a structural error. Statistical edge
//! cases (buildings with undefined residual variance) degrade per building
//! inside the detection stage and never abort the run.

use crate::config::PipelineConfig;
use crate::detection::detect_anomalies;
use crate::features::{build_features, FeatureError};
use crate::oracle::{EnergyOracle, OracleError};
use crate::report::quantify_and_rank;
use crate::split::temporal_split;
use crate::types::{AnomalyReport, EntityThreshold, ReadingTable, RunSummary};
use thiserror::Error;
use tracing::info;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

// ============================================================================
// Outcome
// ============================================================================

/// Everything a run produces: the durable report plus observability data.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Ranked, capped anomaly report — the output artifact
    pub report: AnomalyReport,
    /// Per-building thresholds applied during detection
    pub thresholds: Vec<EntityThreshold>,
    /// Aggregate run figures for logging
    pub summary: RunSummary,
}

/// Run the full pipeline over a reading table.
///
/// The oracle is fitted on the training prefix and then predicts the whole
/// frame: detection wants an expected value for every reading, not only the
/// held-out suffix. The split exists so the fit never sees the future of
/// any evaluation row.
pub fn run(
    table: &ReadingTable,
    oracle: &mut dyn EnergyOracle,
    config: &PipelineConfig,
) -> Result<PipelineOutcome, PipelineError> {
    let frame = build_features(table, &config.features)?;
    let (train, eval) = temporal_split(&frame, config.split.train_fraction);
    let (train_rows, eval_rows) = (train.len(), eval.len());

    oracle.fit(&train)?;

    let (rmse, mae) = if eval.is_empty() {
        (None, None)
    } else {
        let eval_predictions = oracle.predict(&eval)?;
        let rmse = root_mean_squared_error(&eval.target, &eval_predictions);
        let mae = mean_absolute_error(&eval.target, &eval_predictions);
        info!(rmse, mae, eval_rows, "Oracle evaluation on held-out suffix");
        (Some(rmse), Some(mae))
    };

    let predictions = oracle.predict(&frame)?;
    let detection = detect_anomalies(&frame, &predictions, config.detection.threshold_sigma);
    let report = quantify_and_rank(
        &detection.candidates,
        config.report.unit_rate_per_kwh,
        config.report.max_records,
    );

    let summary = RunSummary {
        feature_rows: frame.len(),
        entity_count: distinct_entities(&frame.entity_ids),
        train_rows,
        eval_rows,
        rmse,
        mae,
        entities_skipped: detection.entities_skipped,
        anomalies_detected: report.total_detected,
        report_rows: report.records.len(),
        total_wasted_cost: report.total_wasted_cost,
    };

    info!(
        anomalies = summary.anomalies_detected,
        report_rows = summary.report_rows,
        total_wasted_cost = summary.total_wasted_cost,
        "Pipeline run complete"
    );

    Ok(PipelineOutcome {
        report,
        thresholds: detection.thresholds,
        summary,
    })
}

/// Root mean squared prediction error.
fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    let sse: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (sse / n).sqrt()
}

/// Mean absolute prediction error.
fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len() as f64;
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n
}

/// Count of distinct consecutive entity runs (frame order is grouped).
fn distinct_entities(entity_ids: &[String]) -> usize {
    let mut count = 0;
    let mut prev: Option<&str> = None;
    for id in entity_ids {
        if prev != Some(id.as_str()) {
            count += 1;
            prev = Some(id.as_str());
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rmse_and_mae_of_perfect_predictions_are_zero() {
        let actual = vec![1.0, 2.0, 3.0];
        assert!(root_mean_squared_error(&actual, &actual).abs() < f64::EPSILON);
        assert!(mean_absolute_error(&actual, &actual).abs() < f64::EPSILON);
    }

    #[test]
    fn rmse_penalizes_large_errors_more_than_mae() {
        let actual = vec![0.0, 0.0, 0.0, 0.0];
        let predicted = vec![0.0, 0.0, 0.0, 8.0];
        let rmse = root_mean_squared_error(&actual, &predicted);
        let mae = mean_absolute_error(&actual, &predicted);
        assert!((mae - 2.0).abs() < 1e-12);
        assert!((rmse - 4.0).abs() < 1e-12);
        assert!(rmse > mae);
    }

    #[test]
    fn known_error_values() {
        let actual = vec![10.0, 20.0];
        let predicted = vec![13.0, 16.0];
        assert!((mean_absolute_error(&actual, &predicted) - 3.5).abs() < 1e-12);
        let expected_rmse = ((9.0 + 16.0) / 2.0_f64).sqrt();
        assert!((root_mean_squared_error(&actual, &predicted) - expected_rmse).abs() < 1e-12);
    }

    #[test]
    fn distinct_entity_count_over_grouped_ids() {
        let ids: Vec<String> = ["B1", "B1", "B2", "B3", "B3"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        assert_eq!(distinct_entities(&ids), 3);
        assert_eq!(distinct_entities(&[]), 0);
    }
}
