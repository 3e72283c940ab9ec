//! Pipeline Regression Tests
//!
//! Exercises the full pipeline (features → split → oracle → detection →
//! report) over deterministic synthetic fleets with injected waste events.
//! The synthetic load is linear in the emitted feature set, so the ridge
//! reference oracle tracks it closely and injected spikes dominate the
//! residuals. Asserts on event recovery, report invariants and summary
//! integrity (no NaN costs, counts consistent).

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use wattline::config::{FeatureConfig, PipelineConfig};
use wattline::oracle::{check_schema, EnergyOracle, OracleError};
use wattline::types::{FeatureFrame, FeatureSchema};
use wattline::{pipeline, Reading, ReadingTable, RidgeOracle};

/// Oracle that echoes the measured target back as its prediction — the
/// degenerate "perfect model" end of the pluggable-oracle contract.
struct EchoOracle {
    fitted: Option<(FeatureSchema, Vec<String>)>,
}

impl EnergyOracle for EchoOracle {
    fn fit(&mut self, frame: &FeatureFrame) -> Result<(), OracleError> {
        if frame.is_empty() {
            return Err(OracleError::EmptyTrainingSet);
        }
        self.fitted = Some((frame.schema.clone(), frame.schema.column_names()));
        Ok(())
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, OracleError> {
        let (schema, _) = self.fitted.as_ref().ok_or(OracleError::NotFitted)?;
        check_schema(schema, &frame.schema)?;
        Ok(frame.target.clone())
    }

    fn feature_names(&self) -> &[String] {
        match &self.fitted {
            Some((_, names)) => names,
            None => &[],
        }
    }
}

/// Simulation start: Monday 2017-01-02 00:00 UTC.
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 1, 2, 0, 0, 0).single().unwrap()
}

/// Deterministic outdoor temperature: daily cycle plus a slow weekly swing.
fn outdoor_temp(h: i64) -> f64 {
    let hod = f64::from((h % 24) as i32);
    12.0 + 6.0 * (2.0 * std::f64::consts::PI * hod / 24.0).sin()
        + 2.0 * (2.0 * std::f64::consts::PI * h as f64 / 168.0).sin()
}

/// Base load linear in the feature set the builder emits, so a linear
/// oracle can fit it (near-)exactly and residuals isolate injected waste.
fn clean_load(square_feet: f64, ts: DateTime<Utc>, temp: f64) -> f64 {
    let hod = f64::from(ts.hour());
    let angle = 2.0 * std::f64::consts::PI * hod / 24.0;
    let weekend = if ts.weekday().num_days_from_monday() >= 5 { 1.0 } else { 0.0 };
    20.0 + 0.001 * square_feet + 12.0 * angle.sin() + 8.0 * angle.cos() - 6.0 * weekend
        + 0.5 * temp
}

/// (building, within-series hour, multiplier)
type Spike = (&'static str, i64, f64);

fn fleet(hours: i64, spikes: &[Spike]) -> ReadingTable {
    let buildings = [
        ("B1", 30_000.0, "Office"),
        ("B2", 55_000.0, "Retail"),
        ("B3", 90_000.0, "Education"),
    ];

    let mut table = ReadingTable::new(
        vec!["air_temperature".to_string(), "square_feet".to_string()],
        vec!["primary_use".to_string()],
    );
    for (id, square_feet, primary_use) in buildings {
        for h in 0..hours {
            let ts = start() + Duration::hours(h);
            let temp = outdoor_temp(h);
            let mut load = clean_load(square_feet, ts, temp);
            for &(spike_id, spike_hour, multiplier) in spikes {
                if spike_id == id && spike_hour == h {
                    load *= multiplier;
                }
            }
            table.rows.push(Reading {
                entity_id: id.to_string(),
                timestamp: ts,
                measured_value: load,
                aux_numeric: vec![temp, square_feet],
                aux_categorical: vec![primary_use.to_string()],
            });
        }
    }
    table
}

fn fleet_config() -> PipelineConfig {
    let config = PipelineConfig {
        features: FeatureConfig {
            numeric_covariates: vec![
                "air_temperature".to_string(),
                "square_feet".to_string(),
            ],
            categorical_covariates: vec!["primary_use".to_string()],
            ..FeatureConfig::default()
        },
        ..PipelineConfig::default()
    };
    config.validate().expect("test config must be valid");
    config
}

#[test]
fn injected_waste_events_are_recovered() {
    // One spike inside the training window, one in the evaluation suffix
    let spikes: &[Spike] = &[("B2", 200, 2.5), ("B2", 300, 2.2)];
    let table = fleet(14 * 24, spikes);
    let config = fleet_config();

    let mut oracle = RidgeOracle::new(config.oracle.l2_penalty);
    let outcome = pipeline::run(&table, &mut oracle, &config).expect("pipeline must complete");

    for &(id, hour, _) in spikes {
        let ts = start() + Duration::hours(hour);
        assert!(
            outcome
                .report
                .records
                .iter()
                .any(|r| r.entity_id == id && r.timestamp == ts),
            "injected spike at {id} hour {hour} missing from report"
        );
    }

    // Cost ranking puts the genuine events ahead of any residual-noise rows
    let top: Vec<(&str, DateTime<Utc>)> = outcome
        .report
        .records
        .iter()
        .take(2)
        .map(|r| (r.entity_id.as_str(), r.timestamp))
        .collect();
    for &(id, hour, _) in spikes {
        assert!(
            top.contains(&(id, start() + Duration::hours(hour))),
            "injected spike at {id} hour {hour} not in the top-ranked records"
        );
    }
}

#[test]
fn report_invariants_hold() {
    let table = fleet(14 * 24, &[("B1", 100, 2.0), ("B3", 250, 3.0), ("B2", 310, 2.4)]);
    let config = fleet_config();

    let mut oracle = RidgeOracle::new(config.oracle.l2_penalty);
    let outcome = pipeline::run(&table, &mut oracle, &config).expect("pipeline must complete");
    let report = &outcome.report;

    assert!(report.records.len() <= config.report.max_records);
    assert!(report.total_detected >= report.records.len());

    for r in &report.records {
        assert!(r.wasted_energy > 0.0, "non-positive waste in report");
        assert!(r.wasted_cost.is_finite());
        assert!(
            (r.wasted_cost - r.wasted_energy * config.report.unit_rate_per_kwh).abs() < 1e-9,
            "cost must be energy × unit rate"
        );
        assert!(
            (r.wasted_energy - (r.measured_value - r.expected_value)).abs() < 1e-9,
            "waste must equal measured − expected"
        );
    }
    for pair in report.records.windows(2) {
        assert!(pair[0].wasted_cost >= pair[1].wasted_cost, "report not sorted");
    }
}

#[test]
fn summary_figures_are_consistent() {
    let hours = 10 * 24;
    let table = fleet(hours, &[("B2", 120, 2.5)]);
    let config = fleet_config();

    let mut oracle = RidgeOracle::new(config.oracle.l2_penalty);
    let outcome = pipeline::run(&table, &mut oracle, &config).expect("pipeline must complete");
    let summary = &outcome.summary;

    // Default lags [1, 24], window 6 -> warm-up of 24 rows per building
    assert_eq!(summary.feature_rows, 3 * (hours as usize - 24));
    assert_eq!(summary.entity_count, 3);
    assert_eq!(summary.train_rows + summary.eval_rows, summary.feature_rows);
    assert_eq!(summary.entities_skipped, 0);
    assert_eq!(summary.report_rows, outcome.report.records.len());
    assert_eq!(summary.anomalies_detected, outcome.report.total_detected);

    let rmse = summary.rmse.expect("eval suffix is non-empty");
    let mae = summary.mae.expect("eval suffix is non-empty");
    assert!(rmse.is_finite() && mae.is_finite());
    assert!(rmse >= mae, "RMSE is bounded below by MAE");
}

#[test]
fn raising_sigma_never_flags_more() {
    let table = fleet(10 * 24, &[("B1", 50, 1.8), ("B2", 120, 2.5), ("B3", 180, 1.6)]);

    let mut previous = usize::MAX;
    for sigma in [1.0, 2.0, 3.0, 4.0] {
        let mut config = fleet_config();
        config.detection.threshold_sigma = sigma;

        let mut oracle = RidgeOracle::new(config.oracle.l2_penalty);
        let outcome = pipeline::run(&table, &mut oracle, &config).expect("pipeline must complete");
        assert!(
            outcome.report.total_detected <= previous,
            "sigma {sigma} detected more anomalies than a smaller multiplier"
        );
        previous = outcome.report.total_detected;
    }
}

#[test]
fn report_cap_truncates_but_totals_cover_all() {
    // Three certain anomalies, cap of two: the report truncates while the
    // fleet totals still describe everything detected.
    let table = fleet(10 * 24, &[("B1", 50, 2.0), ("B2", 120, 2.5), ("B3", 180, 2.2)]);
    let mut config = fleet_config();
    config.report.max_records = 2;

    let mut oracle = RidgeOracle::new(config.oracle.l2_penalty);
    let outcome = pipeline::run(&table, &mut oracle, &config).expect("pipeline must complete");

    assert_eq!(outcome.report.records.len(), 2);
    assert!(outcome.report.total_detected >= 3);
    let kept_cost: f64 = outcome.report.records.iter().map(|r| r.wasted_cost).sum();
    assert!(outcome.report.total_wasted_cost >= kept_cost);
}

#[test]
fn short_history_building_degrades_gracefully() {
    // A building with exactly warm-up + 1 rows yields a single residual
    // sample: variance undefined, building skipped, run unaffected.
    let mut table = fleet(10 * 24, &[("B2", 120, 2.5)]);
    for h in 0..25 {
        let ts = start() + Duration::hours(h);
        table.rows.push(Reading {
            entity_id: "B9".to_string(),
            timestamp: ts,
            measured_value: 50.0,
            aux_numeric: vec![outdoor_temp(h), 10_000.0],
            aux_categorical: vec!["Office".to_string()],
        });
    }
    let config = fleet_config();

    let mut oracle = RidgeOracle::new(config.oracle.l2_penalty);
    let outcome = pipeline::run(&table, &mut oracle, &config).expect("pipeline must complete");

    assert_eq!(outcome.summary.entities_skipped, 1);
    assert_eq!(outcome.summary.entity_count, 4);
    assert!(
        !outcome.report.records.iter().any(|r| r.entity_id == "B9"),
        "skipped building must not contribute anomalies"
    );
    // The genuine spike is still found
    let spike_ts = start() + Duration::hours(120);
    assert!(outcome
        .report
        .records
        .iter()
        .any(|r| r.entity_id == "B2" && r.timestamp == spike_ts));
}

#[test]
fn perfect_predictions_yield_empty_report() {
    // An oracle with zero residual everywhere: no positive deviation can
    // exist, so the report is empty — a normal outcome, not an error.
    let table = fleet(10 * 24, &[]);
    let config = fleet_config();

    let mut oracle = EchoOracle { fitted: None };
    let outcome = pipeline::run(&table, &mut oracle, &config).expect("pipeline must complete");

    assert_eq!(outcome.report.total_detected, 0);
    assert!(outcome.report.records.is_empty());
    assert!(outcome.report.total_wasted_cost.abs() < f64::EPSILON);
    // Perfect predictions also mean zero evaluation error
    assert!(outcome.summary.rmse.unwrap_or(f64::NAN).abs() < 1e-12);
    assert!(outcome.summary.mae.unwrap_or(f64::NAN).abs() < 1e-12);
}
