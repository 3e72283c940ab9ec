//! Entity-Grouped Feature Builder
//!
//! Derives the oracle-facing feature table from raw readings:
//!
//! - Calendar features: raw hour/day-of-week/month, weekend flag, and
//!   cyclical sin/cos encodings (see [`calendar`])
//! - Lag features: `lag_{H}h` = the same building's reading H steps earlier
//! - Rolling statistic: trailing mean over the last W readings
//!
//! All causal features are scoped strictly within one building. The table is
//! partitioned by entity before any shifting or windowing — a single global
//! shift over a sorted table would source the first rows of one building from
//! the tail of the previous one. Partitions are independent, so they are
//! processed in parallel with rayon; each writes to a disjoint output slot.
//!
//! Rows that lack any lag or rolling value (the warm-up head of each
//! building's history) are dropped from the output. Callers must not assume
//! coverage near a building's earliest timestamps.

pub mod calendar;

use crate::config::FeatureConfig;
use crate::types::{FeatureFrame, FeatureSchema, Reading, ReadingTable};
use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Required input column missing: {0}")]
    MissingColumn(String),
}

// ============================================================================
// Builder
// ============================================================================

/// Causal per-row values computed inside one entity partition.
struct CausalRow {
    /// Index into the canonically sorted row vector
    idx: usize,
    /// One value per configured lag horizon
    lags: Vec<f64>,
    /// Trailing window mean ending at this row
    rolling: f64,
}

/// Build the feature frame from a reading table.
///
/// Output rows are grouped by entity (ascending id), ascending timestamp
/// within each entity; the ordering is deterministic so downstream lag and
/// threshold semantics are reproducible.
///
/// Fails fast with [`FeatureError::MissingColumn`] if a configured covariate
/// column is absent from the table — no partial frame is produced.
pub fn build_features(
    table: &ReadingTable,
    config: &FeatureConfig,
) -> Result<FeatureFrame, FeatureError> {
    let numeric_idx = resolve_columns(&config.numeric_covariates, &table.numeric_names)?;
    let categorical_idx =
        resolve_columns(&config.categorical_covariates, &table.categorical_names)?;

    let mut rows = table.rows.clone();
    rows.sort_by(|a, b| (&a.entity_id, a.timestamp).cmp(&(&b.entity_id, b.timestamp)));

    let max_lag = config.lag_steps.iter().copied().max().unwrap_or(0);
    let warmup = max_lag.max(config.rolling_window.saturating_sub(1));

    let partitions = entity_partitions(&rows);
    let entity_count = partitions.len();

    // Per-entity causal stats; partitions are disjoint, so this is safely
    // parallel with no shared mutable state.
    let blocks: Vec<Vec<CausalRow>> = partitions
        .par_iter()
        .map(|&(start, end)| {
            causal_rows(
                &rows[start..end],
                start,
                &config.lag_steps,
                config.rolling_window,
                warmup,
            )
        })
        .collect();

    let schema = build_schema(config);
    let mut frame = FeatureFrame {
        entity_ids: Vec::new(),
        timestamps: Vec::new(),
        target: Vec::new(),
        numeric: vec![Vec::new(); schema.numeric.len()],
        categorical: vec![Vec::new(); schema.categorical.len()],
        schema,
    };

    for block in &blocks {
        for causal in block {
            push_row(&mut frame, &rows[causal.idx], causal, &numeric_idx, &categorical_idx, config);
        }
    }

    info!(
        input_rows = rows.len(),
        feature_rows = frame.len(),
        entities = entity_count,
        warmup_dropped = rows.len() - frame.len(),
        "Feature frame built"
    );

    Ok(frame)
}

/// Map configured column names to their indices in the table header.
fn resolve_columns(wanted: &[String], available: &[String]) -> Result<Vec<usize>, FeatureError> {
    wanted
        .iter()
        .map(|name| {
            available
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| FeatureError::MissingColumn(name.clone()))
        })
        .collect()
}

/// Consecutive (start, end) runs of equal entity_id over canonically sorted rows.
fn entity_partitions(rows: &[Reading]) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        if i == rows.len() || rows[i].entity_id != rows[start].entity_id {
            parts.push((start, i));
            start = i;
        }
    }
    parts
}

/// Lags and trailing mean for one entity's ordered readings.
///
/// A row survives only when every lag horizon and the full rolling window
/// are available, i.e. its within-entity index is >= warmup.
fn causal_rows(
    entity_rows: &[Reading],
    base: usize,
    lag_steps: &[usize],
    window: usize,
    warmup: usize,
) -> Vec<CausalRow> {
    let n = entity_rows.len();
    let mut out = Vec::with_capacity(n.saturating_sub(warmup));
    let mut window_sum = 0.0;

    for i in 0..n {
        window_sum += entity_rows[i].measured_value;
        if i >= window {
            window_sum -= entity_rows[i - window].measured_value;
        }
        if i < warmup {
            continue;
        }

        let lags = lag_steps
            .iter()
            .map(|&h| entity_rows[i - h].measured_value)
            .collect();
        out.push(CausalRow {
            idx: base + i,
            lags,
            rolling: window_sum / window as f64,
        });
    }
    out
}

/// Feature column names in contract order. The schema is a function of the
/// config alone, so fit-time and predict-time frames built with the same
/// config always agree.
fn build_schema(config: &FeatureConfig) -> FeatureSchema {
    let mut numeric: Vec<String> = config.numeric_covariates.clone();
    numeric.extend(
        [
            "hour",
            "day_of_week",
            "month",
            "is_weekend",
            "hour_sin",
            "hour_cos",
            "month_sin",
            "month_cos",
            "day_of_week_sin",
            "day_of_week_cos",
        ]
        .map(String::from),
    );
    for h in &config.lag_steps {
        numeric.push(format!("lag_{h}h"));
    }
    numeric.push(format!("rolling_mean_{}h", config.rolling_window));

    FeatureSchema {
        numeric,
        categorical: config.categorical_covariates.clone(),
    }
}

/// Append one surviving row to the column-major frame.
fn push_row(
    frame: &mut FeatureFrame,
    row: &Reading,
    causal: &CausalRow,
    numeric_idx: &[usize],
    categorical_idx: &[usize],
    config: &FeatureConfig,
) {
    frame.entity_ids.push(row.entity_id.clone());
    frame.timestamps.push(row.timestamp);
    frame.target.push(row.measured_value);

    let hour = f64::from(calendar::hour_of_day(row.timestamp));
    let dow = f64::from(calendar::day_of_week(row.timestamp));
    let month = f64::from(calendar::month(row.timestamp));
    let (hour_sin, hour_cos) = calendar::cyclical(hour, config.hour_period);
    let (month_sin, month_cos) = calendar::cyclical(month, config.month_period);
    let (dow_sin, dow_cos) = calendar::cyclical(dow, config.day_of_week_period);

    let mut values = Vec::with_capacity(frame.schema.numeric.len());
    for &c in numeric_idx {
        values.push(row.aux_numeric[c]);
    }
    values.extend([
        hour,
        dow,
        month,
        if calendar::is_weekend(row.timestamp) { 1.0 } else { 0.0 },
        hour_sin,
        hour_cos,
        month_sin,
        month_cos,
        dow_sin,
        dow_cos,
    ]);
    values.extend_from_slice(&causal.lags);
    values.push(causal.rolling);

    for (col, value) in frame.numeric.iter_mut().zip(values) {
        col.push(value);
    }
    for (col, &c) in frame.categorical.iter_mut().zip(categorical_idx) {
        col.push(row.aux_categorical[c].clone());
    }
}
