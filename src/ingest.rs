//! Readings ingest — long-format CSV to [`ReadingTable`].
//!
//! The heavy ETL (melting wide meter files, merging weather and metadata)
//! happens upstream; this adapter only loads the already-merged long table.
//! Required columns are validated against the header before any row is
//! parsed — a missing column is fatal. Individual rows with unparseable
//! timestamps or values are skipped and counted, never repaired.

use crate::config::FeatureConfig;
use crate::types::{Reading, ReadingTable};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Required input column missing: {0}")]
    MissingColumn(String),

    #[error("No parseable readings in {0}")]
    EmptyInput(PathBuf),
}

// ============================================================================
// CSV Parsing
// ============================================================================

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.clone());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Parse a timestamp in `%Y-%m-%d %H:%M:%S` or RFC 3339 form, as UTC.
fn parse_timestamp(field: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(field, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(field)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Find a required column in the header or fail.
fn require_column(header: &[String], name: &str) -> Result<usize, IngestError> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| IngestError::MissingColumn(name.to_string()))
}

// ============================================================================
// Loader
// ============================================================================

/// Load a long-format readings CSV.
///
/// Required columns: `building_id`, `timestamp`, `meter_reading`, plus every
/// covariate named in the feature config. Column validation happens on the
/// header, before any row work; rows that fail to parse are skipped and
/// counted.
pub fn load_readings(path: &Path, config: &FeatureConfig) -> Result<ReadingTable, IngestError> {
    let file = File::open(path).map_err(|e| IngestError::Io(path.to_path_buf(), e))?;
    let mut lines = BufReader::new(file).lines();

    let header_line = match lines.next() {
        Some(Ok(line)) => line,
        Some(Err(e)) => return Err(IngestError::Io(path.to_path_buf(), e)),
        None => return Err(IngestError::EmptyInput(path.to_path_buf())),
    };
    let header = csv_split(&header_line);

    let entity_col = require_column(&header, "building_id")?;
    let timestamp_col = require_column(&header, "timestamp")?;
    let value_col = require_column(&header, "meter_reading")?;
    let numeric_cols: Vec<usize> = config
        .numeric_covariates
        .iter()
        .map(|name| require_column(&header, name))
        .collect::<Result<_, _>>()?;
    let categorical_cols: Vec<usize> = config
        .categorical_covariates
        .iter()
        .map(|name| require_column(&header, name))
        .collect::<Result<_, _>>()?;

    let mut table = ReadingTable::new(
        config.numeric_covariates.clone(),
        config.categorical_covariates.clone(),
    );
    let mut skipped = 0_usize;

    for line in lines {
        let line = match line {
            Ok(l) => l,
            Err(e) => return Err(IngestError::Io(path.to_path_buf(), e)),
        };
        if line.trim().is_empty() {
            continue;
        }
        let fields = csv_split(&line);

        match parse_row(
            &fields,
            entity_col,
            timestamp_col,
            value_col,
            &numeric_cols,
            &categorical_cols,
        ) {
            Some(reading) => table.rows.push(reading),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, path = %path.display(), "Skipped unparseable reading rows");
    }
    if table.is_empty() {
        return Err(IngestError::EmptyInput(path.to_path_buf()));
    }

    table.sort_canonical();
    info!(
        rows = table.len(),
        entities = table.entity_count(),
        path = %path.display(),
        "Readings loaded"
    );
    Ok(table)
}

/// Parse one data row; None skips the row.
fn parse_row(
    fields: &[String],
    entity_col: usize,
    timestamp_col: usize,
    value_col: usize,
    numeric_cols: &[usize],
    categorical_cols: &[usize],
) -> Option<Reading> {
    let max_col = [entity_col, timestamp_col, value_col]
        .into_iter()
        .chain(numeric_cols.iter().copied())
        .chain(categorical_cols.iter().copied())
        .max()
        .unwrap_or(0);
    if fields.len() <= max_col {
        return None;
    }

    let entity_id = fields[entity_col].trim();
    if entity_id.is_empty() {
        return None;
    }
    let timestamp = parse_timestamp(fields[timestamp_col].trim())?;
    let measured_value: f64 = fields[value_col].trim().parse().ok()?;
    if !measured_value.is_finite() {
        return None;
    }

    let aux_numeric = numeric_cols
        .iter()
        .map(|&c| fields[c].trim().parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;
    let aux_categorical = categorical_cols
        .iter()
        .map(|&c| fields[c].trim().to_string())
        .collect();

    Some(Reading {
        entity_id: entity_id.to_string(),
        timestamp,
        measured_value,
        aux_numeric,
        aux_categorical,
    })
}
