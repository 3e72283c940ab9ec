//! Waste Quantifier & Ranker
//!
//! Translates flagged deviations into energy and dollar units, then ranks
//! by financial impact. Only the top records survive the configured cap so
//! the downstream reporting layer has a bounded artifact to render;
//! `total_detected` and `total_wasted_cost` still describe the full set.

use crate::types::{AnomalyCandidate, AnomalyRecord, AnomalyReport};
use std::io::Write;
use tracing::info;

/// Convert candidates to costed records, rank by wasted cost descending and
/// truncate to `max_records`.
///
/// The sort is stable, so records with equal cost keep the engine's
/// entity-grouped time order. An empty candidate set yields an empty report;
/// that is a normal outcome, not an error.
pub fn quantify_and_rank(
    candidates: &[AnomalyCandidate],
    unit_rate_per_kwh: f64,
    max_records: usize,
) -> AnomalyReport {
    let mut records: Vec<AnomalyRecord> = candidates
        .iter()
        .map(|c| AnomalyRecord {
            timestamp: c.timestamp,
            entity_id: c.entity_id.clone(),
            measured_value: c.measured_value,
            expected_value: c.expected_value,
            wasted_energy: c.deviation,
            wasted_cost: c.deviation * unit_rate_per_kwh,
        })
        .collect();

    let total_detected = records.len();
    let total_wasted_cost = records.iter().map(|r| r.wasted_cost).sum();

    records.sort_by(|a, b| b.wasted_cost.total_cmp(&a.wasted_cost));
    records.truncate(max_records);

    info!(
        total_detected,
        kept = records.len(),
        total_wasted_cost,
        unit_rate_per_kwh,
        "Anomaly report ranked"
    );

    AnomalyReport {
        records,
        total_detected,
        total_wasted_cost,
    }
}

/// Serialize the report for the reporting collaborator.
///
/// Only boundary fields are written — timestamp, building, actual, expected,
/// wasted energy and cost. Internal feature columns never reach this file.
pub fn write_csv<W: Write>(report: &AnomalyReport, out: &mut W) -> std::io::Result<()> {
    writeln!(
        out,
        "timestamp,building_id,meter_reading,expected_reading,wasted_kwh,wasted_cost"
    )?;
    for r in &report.records {
        writeln!(
            out,
            "{},{},{:.4},{:.4},{:.4},{:.4}",
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
            r.entity_id,
            r.measured_value,
            r.expected_value,
            r.wasted_energy,
            r.wasted_cost,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 3, 1, 0, 0, 0).single().unwrap() + Duration::hours(h)
    }

    fn candidate(entity: &str, h: i64, deviation: f64) -> AnomalyCandidate {
        AnomalyCandidate {
            entity_id: entity.to_string(),
            timestamp: ts(h),
            measured_value: 10.0 + deviation,
            expected_value: 10.0,
            deviation,
        }
    }

    #[test]
    fn cost_is_deviation_times_unit_rate() {
        let report = quantify_and_rank(&[candidate("B1", 0, 40.0)], 0.14, 5000);
        let r = &report.records[0];
        assert!((r.wasted_energy - 40.0).abs() < 1e-12);
        assert!((r.wasted_cost - 5.6).abs() < 1e-12);
    }

    #[test]
    fn sorted_descending_and_capped() {
        let candidates: Vec<_> = (0..10)
            .map(|i| candidate("B1", i, f64::from(i as i32) + 1.0))
            .collect();
        let report = quantify_and_rank(&candidates, 0.14, 4);

        assert_eq!(report.records.len(), 4);
        assert_eq!(report.total_detected, 10);
        for pair in report.records.windows(2) {
            assert!(pair[0].wasted_cost >= pair[1].wasted_cost);
        }
        // Highest deviation (10.0) leads
        assert!((report.records[0].wasted_energy - 10.0).abs() < 1e-12);
    }

    #[test]
    fn totals_cover_truncated_records() {
        let candidates: Vec<_> = (0..5).map(|i| candidate("B1", i, 10.0)).collect();
        let report = quantify_and_rank(&candidates, 1.0, 2);

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.total_detected, 5);
        assert!((report.total_wasted_cost - 50.0).abs() < 1e-12);
    }

    #[test]
    fn equal_costs_keep_input_order() {
        let candidates = vec![
            candidate("B1", 3, 5.0),
            candidate("B2", 1, 5.0),
            candidate("B3", 2, 5.0),
        ];
        let report = quantify_and_rank(&candidates, 0.14, 5000);
        let order: Vec<&str> = report.records.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(order, vec!["B1", "B2", "B3"]);
    }

    #[test]
    fn empty_candidates_yield_empty_report() {
        let report = quantify_and_rank(&[], 0.14, 5000);
        assert!(report.records.is_empty());
        assert_eq!(report.total_detected, 0);
        assert!(report.total_wasted_cost.abs() < f64::EPSILON);
    }

    #[test]
    fn csv_exposes_only_boundary_fields() {
        let report = quantify_and_rank(&[candidate("B7", 2, 40.0)], 0.14, 5000);
        let mut buf = Vec::new();
        write_csv(&report, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,building_id,meter_reading,expected_reading,wasted_kwh,wasted_cost")
        );
        assert_eq!(
            lines.next(),
            Some("2017-03-01 02:00:00,B7,50.0000,10.0000,40.0000,5.6000")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn all_records_strictly_positive_waste() {
        // The engine only hands over positive deviations; the ranker
        // preserves that invariant.
        let candidates: Vec<_> = [0.5, 12.0, 3.3].iter().enumerate()
            .map(|(i, &d)| candidate("B1", i as i64, d))
            .collect();
        let report = quantify_and_rank(&candidates, 0.14, 5000);
        assert!(report.records.iter().all(|r| r.wasted_energy > 0.0));
    }
}
