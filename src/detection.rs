//! Residual & Threshold Engine
//!
//! Scores every prediction-bearing reading against a per-building dynamic
//! threshold instead of a single global cutoff, so small and large buildings
//! are judged fairly:
//!
//! 1. deviation = measured − expected
//! 2. std_error = sample stddev of the building's full residual population
//! 3. anomaly when deviation > sigma × std_error AND deviation > 0
//!
//! The positive-only rule is deliberate: this is a waste detector, not a
//! general outlier detector. A building consuming far LESS than expected is
//! never flagged.
//!
//! Statistical edge cases degrade per building, never crash the run: a
//! building with fewer than two residual samples has undefined variance and
//! is skipped with a warning; a perfectly predicted building has a zero
//! threshold, so any strictly positive deviation flags while zero or
//! negative deviations never do.

use crate::types::{AnomalyCandidate, EntityThreshold, FeatureFrame};
use rayon::prelude::*;
use statrs::statistics::Statistics;
use tracing::{info, warn};

/// Result of one detection pass over a predicted frame.
#[derive(Debug)]
pub struct DetectionOutcome {
    /// Flagged readings, in frame order (entity-grouped, time ascending)
    pub candidates: Vec<AnomalyCandidate>,
    /// Per-building thresholds actually applied
    pub thresholds: Vec<EntityThreshold>,
    /// Buildings skipped because their residual variance was undefined
    pub entities_skipped: usize,
}

/// Classify anomalies across the frame.
///
/// `predictions` must align row-for-row with `frame`; both come from the
/// same oracle pass. Buildings are independent, so per-building scoring runs
/// in parallel and results are recombined in frame order.
pub fn detect_anomalies(
    frame: &FeatureFrame,
    predictions: &[f64],
    threshold_sigma: f64,
) -> DetectionOutcome {
    assert_eq!(
        frame.len(),
        predictions.len(),
        "predictions must align with the frame"
    );

    let deviations: Vec<f64> = frame
        .target
        .iter()
        .zip(predictions)
        .map(|(measured, expected)| measured - expected)
        .collect();

    let partitions = entity_partitions(&frame.entity_ids);

    let per_entity: Vec<(Option<EntityThreshold>, Vec<AnomalyCandidate>)> = partitions
        .par_iter()
        .map(|&(start, end)| {
            score_entity(frame, predictions, &deviations, start, end, threshold_sigma)
        })
        .collect();

    let mut outcome = DetectionOutcome {
        candidates: Vec::new(),
        thresholds: Vec::new(),
        entities_skipped: 0,
    };
    for (threshold, candidates) in per_entity {
        match threshold {
            Some(t) => outcome.thresholds.push(t),
            None => outcome.entities_skipped += 1,
        }
        outcome.candidates.extend(candidates);
    }

    info!(
        entities = partitions.len(),
        flagged = outcome.candidates.len(),
        skipped = outcome.entities_skipped,
        sigma = threshold_sigma,
        "Residual scoring complete"
    );

    outcome
}

/// Threshold and candidates for one building's row range.
fn score_entity(
    frame: &FeatureFrame,
    predictions: &[f64],
    deviations: &[f64],
    start: usize,
    end: usize,
    threshold_sigma: f64,
) -> (Option<EntityThreshold>, Vec<AnomalyCandidate>) {
    let entity_id = &frame.entity_ids[start];

    // Non-finite residuals (NaN propagated from upstream) are excluded from
    // the variance estimate and can never flag below.
    let finite: Vec<f64> = deviations[start..end]
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .collect();

    if finite.len() < 2 {
        warn!(
            entity = %entity_id,
            samples = finite.len(),
            "Residual variance undefined — no anomalies possible for this building"
        );
        return (None, Vec::new());
    }

    let std_error = (&finite).std_dev();
    let threshold = threshold_sigma * std_error;

    let candidates = (start..end)
        .filter(|&i| {
            let d = deviations[i];
            d.is_finite() && d > threshold && d > 0.0
        })
        .map(|i| AnomalyCandidate {
            entity_id: frame.entity_ids[i].clone(),
            timestamp: frame.timestamps[i],
            measured_value: frame.target[i],
            expected_value: predictions[i],
            deviation: deviations[i],
        })
        .collect();

    (
        Some(EntityThreshold {
            entity_id: entity_id.clone(),
            std_error,
            threshold,
            sample_count: finite.len(),
        }),
        candidates,
    )
}

/// Consecutive (start, end) runs of equal entity_id.
fn entity_partitions(entity_ids: &[String]) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let mut start = 0;
    for i in 1..=entity_ids.len() {
        if i == entity_ids.len() || entity_ids[i] != entity_ids[start] {
            parts.push((start, i));
            start = i;
        }
    }
    parts
}
