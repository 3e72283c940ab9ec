//! Core data types shared across the waste-detection pipeline.
//!
//! The pipeline moves through three table shapes:
//!
//! 1. [`ReadingTable`] — long-format meter readings as delivered by the
//!    upstream ETL merge (one row per building per timestamp).
//! 2. [`FeatureFrame`] — column-major feature table produced by the feature
//!    builder and consumed by the prediction oracle. Its [`FeatureSchema`]
//!    is the oracle contract: names and order are fixed at fit time.
//! 3. [`AnomalyReport`] — the only durable output artifact, handed to the
//!    reporting collaborator. No internal feature columns leak into it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Readings (input boundary)
// ============================================================================

/// A single meter observation for one building.
///
/// Auxiliary covariates are positional: `aux_numeric` aligns with the owning
/// table's `numeric_names`, `aux_categorical` with `categorical_names`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Stable building identifier
    pub entity_id: String,
    /// Observation time (entity-local monotonic once sorted)
    pub timestamp: DateTime<Utc>,
    /// Metered consumption (kWh)
    pub measured_value: f64,
    /// Numeric covariates (e.g. air temperature, floor area)
    pub aux_numeric: Vec<f64>,
    /// Categorical covariates (e.g. primary use)
    pub aux_categorical: Vec<String>,
}

/// Long-format table of readings with table-level covariate column names.
#[derive(Debug, Clone, Default)]
pub struct ReadingTable {
    /// Names of the numeric covariate columns, in row order
    pub numeric_names: Vec<String>,
    /// Names of the categorical covariate columns, in row order
    pub categorical_names: Vec<String>,
    /// Rows; call [`ReadingTable::sort_canonical`] before grouped processing
    pub rows: Vec<Reading>,
}

impl ReadingTable {
    /// Create an empty table with the given covariate column names.
    pub fn new(numeric_names: Vec<String>, categorical_names: Vec<String>) -> Self {
        Self {
            numeric_names,
            categorical_names,
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sort rows by (entity_id, timestamp), stable.
    ///
    /// All grouped computations (lags, rolling stats, thresholds) assume this
    /// ordering. Sorting alone does not make a global windowed pass safe —
    /// the feature builder still partitions by entity before shifting.
    pub fn sort_canonical(&mut self) {
        self.rows
            .sort_by(|a, b| (&a.entity_id, a.timestamp).cmp(&(&b.entity_id, b.timestamp)));
    }

    /// Number of distinct entities. Assumes canonical ordering.
    pub fn entity_count(&self) -> usize {
        let mut count = 0;
        let mut prev: Option<&str> = None;
        for row in &self.rows {
            if prev != Some(row.entity_id.as_str()) {
                count += 1;
                prev = Some(row.entity_id.as_str());
            }
        }
        count
    }
}

// ============================================================================
// Feature frame (oracle boundary)
// ============================================================================

/// Ordered schema of oracle-facing feature columns.
///
/// Equality of two schemas (names AND order) is the oracle contract; the
/// adapter refuses to predict against a frame whose schema differs from the
/// one recorded at fit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Numeric feature column names, in column order
    pub numeric: Vec<String>,
    /// Categorical feature column names, in column order
    pub categorical: Vec<String>,
}

impl FeatureSchema {
    /// All column names in contract order: numeric first, then categorical.
    pub fn column_names(&self) -> Vec<String> {
        self.numeric
            .iter()
            .chain(self.categorical.iter())
            .cloned()
            .collect()
    }

    /// Total number of feature columns.
    pub fn width(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }
}

/// Column-major feature table produced by the feature builder.
///
/// Row `i` is described by `entity_ids[i]`, `timestamps[i]`, `target[i]`,
/// `numeric[c][i]` for each numeric column `c` and `categorical[c][i]` for
/// each categorical column. Rows are grouped by entity, ascending timestamp
/// within each entity.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    /// Oracle-facing column schema
    pub schema: FeatureSchema,
    /// Building identifier per row
    pub entity_ids: Vec<String>,
    /// Observation time per row
    pub timestamps: Vec<DateTime<Utc>>,
    /// Regression target (measured consumption, kWh) per row
    pub target: Vec<f64>,
    /// Numeric feature columns, aligned with `schema.numeric`
    pub numeric: Vec<Vec<f64>>,
    /// Categorical feature columns, aligned with `schema.categorical`
    pub categorical: Vec<Vec<String>>,
}

impl FeatureFrame {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entity_ids.len()
    }

    /// Whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.entity_ids.is_empty()
    }

    /// Gather the given rows (by index) into a new frame with the same schema.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            schema: self.schema.clone(),
            entity_ids: indices
                .iter()
                .map(|&i| self.entity_ids[i].clone())
                .collect(),
            timestamps: indices.iter().map(|&i| self.timestamps[i]).collect(),
            target: indices.iter().map(|&i| self.target[i]).collect(),
            numeric: self
                .numeric
                .iter()
                .map(|col| indices.iter().map(|&i| col[i]).collect())
                .collect(),
            categorical: self
                .categorical
                .iter()
                .map(|col| indices.iter().map(|&i| col[i].clone()).collect())
                .collect(),
        }
    }
}

// ============================================================================
// Detection & report (output boundary)
// ============================================================================

/// A reading flagged by the residual engine, before financial translation.
#[derive(Debug, Clone)]
pub struct AnomalyCandidate {
    /// Building identifier
    pub entity_id: String,
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Actual metered consumption (kWh)
    pub measured_value: f64,
    /// Oracle prediction ("virtual meter", kWh)
    pub expected_value: f64,
    /// measured − expected; strictly positive for every candidate
    pub deviation: f64,
}

/// Per-entity dynamic threshold derived from the residual population.
#[derive(Debug, Clone, Serialize)]
pub struct EntityThreshold {
    /// Building identifier
    pub entity_id: String,
    /// Sample standard deviation of the entity's residuals
    pub std_error: f64,
    /// Detection cutoff: sigma multiplier × std_error
    pub threshold: f64,
    /// Residual samples the threshold was computed from
    pub sample_count: usize,
}

/// A confirmed excess-usage event with its financial impact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Building identifier
    pub entity_id: String,
    /// Actual metered consumption (kWh)
    pub measured_value: f64,
    /// Oracle prediction (kWh)
    pub expected_value: f64,
    /// Excess consumption above expectation (kWh); always > 0
    pub wasted_energy: f64,
    /// wasted_energy × unit rate ($)
    pub wasted_cost: f64,
}

/// Ranked anomaly report — the pipeline's durable output.
///
/// `records` is sorted by `wasted_cost` descending and truncated to the
/// configured cap; `total_detected` and `total_wasted_cost` cover ALL
/// detected anomalies, including those cut by the cap.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    /// Top records by cost, capped
    pub records: Vec<AnomalyRecord>,
    /// Anomaly count before truncation
    pub total_detected: usize,
    /// Summed wasted cost before truncation ($)
    pub total_wasted_cost: f64,
}

impl AnomalyReport {
    /// An empty report — the normal outcome when nothing is anomalous.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total_detected: 0,
            total_wasted_cost: 0.0,
        }
    }
}

// ============================================================================
// Run summary
// ============================================================================

/// Aggregate figures for one end-to-end pipeline run, for logging and the
/// CLI exit banner.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Rows in the feature frame (after warm-up elimination)
    pub feature_rows: usize,
    /// Distinct buildings in the feature frame
    pub entity_count: usize,
    /// Rows the oracle was fitted on
    pub train_rows: usize,
    /// Rows in the evaluation suffix
    pub eval_rows: usize,
    /// Root mean squared error over the evaluation suffix (kWh), if computed
    pub rmse: Option<f64>,
    /// Mean absolute error over the evaluation suffix (kWh), if computed
    pub mae: Option<f64>,
    /// Entities skipped because their residual variance was undefined
    pub entities_skipped: usize,
    /// Total anomalies detected (before the report cap)
    pub anomalies_detected: usize,
    /// Records kept in the report after the cap
    pub report_rows: usize,
    /// Summed wasted cost across all detected anomalies ($)
    pub total_wasted_cost: f64,
}
