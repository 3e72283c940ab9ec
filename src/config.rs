//! Pipeline Configuration - All tunables as operator-editable TOML values
//!
//! Every constant the detection pipeline depends on (lag horizons, rolling
//! window, cyclical periods, threshold multiplier, unit cost rate, report
//! cap, split fraction) is a field here rather than a hardcoded value.
//!
//! ## Loading Order
//!
//! 1. `WATTLINE_CONFIG` environment variable (path to TOML file)
//! 2. `energy_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded config is passed explicitly into each pipeline component —
//! there is no process-wide singleton, so tests can run the engine with
//! varied parameters side by side.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a detection deployment.
///
/// Load with [`PipelineConfig::load`], which searches:
/// 1. `$WATTLINE_CONFIG` env var
/// 2. `./energy_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Feature builder tunables
    #[serde(default)]
    pub features: FeatureConfig,

    /// Train/eval split
    #[serde(default)]
    pub split: SplitConfig,

    /// Residual threshold engine
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Financial translation and ranking
    #[serde(default)]
    pub report: ReportConfig,

    /// Reference oracle tuning
    #[serde(default)]
    pub oracle: OracleConfig,
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$WATTLINE_CONFIG` environment variable
    /// 2. `./energy_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("WATTLINE_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded pipeline config from WATTLINE_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from WATTLINE_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "WATTLINE_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("energy_config.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded pipeline config from ./energy_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./energy_config.toml, using defaults");
                }
            }
        }

        info!("No energy_config.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints. Called automatically on file load;
    /// call manually when constructing configs in code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.features.lag_steps.is_empty() {
            return Err(ConfigError::Invalid(
                "features.lag_steps must name at least one horizon".to_string(),
            ));
        }
        if self.features.lag_steps.contains(&0) {
            return Err(ConfigError::Invalid(
                "features.lag_steps horizons must be >= 1".to_string(),
            ));
        }
        if self.features.rolling_window == 0 {
            return Err(ConfigError::Invalid(
                "features.rolling_window must be >= 1".to_string(),
            ));
        }
        for (name, period) in [
            ("hour_period", self.features.hour_period),
            ("day_of_week_period", self.features.day_of_week_period),
            ("month_period", self.features.month_period),
        ] {
            if period <= 0.0 || !period.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "features.{name} must be a positive finite period"
                )));
            }
        }
        if !(self.split.train_fraction > 0.0 && self.split.train_fraction < 1.0) {
            return Err(ConfigError::Invalid(
                "split.train_fraction must be strictly between 0 and 1".to_string(),
            ));
        }
        if self.detection.threshold_sigma <= 0.0 || !self.detection.threshold_sigma.is_finite() {
            return Err(ConfigError::Invalid(
                "detection.threshold_sigma must be a positive finite multiplier".to_string(),
            ));
        }
        if self.report.unit_rate_per_kwh < 0.0 || !self.report.unit_rate_per_kwh.is_finite() {
            return Err(ConfigError::Invalid(
                "report.unit_rate_per_kwh must be a non-negative finite rate".to_string(),
            ));
        }
        if self.report.max_records == 0 {
            return Err(ConfigError::Invalid(
                "report.max_records must be >= 1".to_string(),
            ));
        }
        if self.oracle.l2_penalty < 0.0 || !self.oracle.l2_penalty.is_finite() {
            return Err(ConfigError::Invalid(
                "oracle.l2_penalty must be a non-negative finite damping term".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Section Configs
// ============================================================================

/// Feature builder tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Lag horizons in steps (hours at hourly cadence). Each horizon H emits
    /// a `lag_{H}h` column sourced strictly within the same building.
    #[serde(default = "default_lag_steps")]
    pub lag_steps: Vec<usize>,

    /// Trailing mean window in steps; emits `rolling_mean_{W}h`
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,

    /// Period of the hour-of-day cyclical encoding
    #[serde(default = "default_hour_period")]
    pub hour_period: f64,

    /// Period of the day-of-week cyclical encoding
    #[serde(default = "default_day_of_week_period")]
    pub day_of_week_period: f64,

    /// Period of the month cyclical encoding
    #[serde(default = "default_month_period")]
    pub month_period: f64,

    /// Numeric covariate columns carried through from the input table
    #[serde(default = "default_numeric_covariates")]
    pub numeric_covariates: Vec<String>,

    /// Categorical covariate columns carried through from the input table
    #[serde(default = "default_categorical_covariates")]
    pub categorical_covariates: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lag_steps: default_lag_steps(),
            rolling_window: default_rolling_window(),
            hour_period: default_hour_period(),
            day_of_week_period: default_day_of_week_period(),
            month_period: default_month_period(),
            numeric_covariates: default_numeric_covariates(),
            categorical_covariates: default_categorical_covariates(),
        }
    }
}

fn default_lag_steps() -> Vec<usize> {
    vec![1, 24]
}
fn default_rolling_window() -> usize {
    6
}
fn default_hour_period() -> f64 {
    24.0
}
fn default_day_of_week_period() -> f64 {
    7.0
}
fn default_month_period() -> f64 {
    12.0
}
fn default_numeric_covariates() -> Vec<String> {
    vec!["air_temperature".to_string(), "square_feet".to_string()]
}
fn default_categorical_covariates() -> Vec<String> {
    vec!["primary_use".to_string()]
}

/// Train/eval split tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of the globally time-sorted table used as the training
    /// prefix; the remainder is the evaluation suffix
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: default_train_fraction(),
        }
    }
}

fn default_train_fraction() -> f64 {
    0.8
}

/// Residual threshold engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Sigma multiplier k: a reading flags when its residual exceeds
    /// k × stddev of that building's residuals (and is positive)
    #[serde(default = "default_threshold_sigma")]
    pub threshold_sigma: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_sigma: default_threshold_sigma(),
        }
    }
}

fn default_threshold_sigma() -> f64 {
    2.0
}

/// Financial translation and report ranking tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Flat commercial electricity rate ($/kWh); not building-specific
    #[serde(default = "default_unit_rate")]
    pub unit_rate_per_kwh: f64,

    /// Report cap: only the top N records by wasted cost are kept
    #[serde(default = "default_max_records")]
    pub max_records: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            unit_rate_per_kwh: default_unit_rate(),
            max_records: default_max_records(),
        }
    }
}

fn default_unit_rate() -> f64 {
    0.14
}
fn default_max_records() -> usize {
    5000
}

/// Reference oracle tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// L2 damping for the ridge reference oracle's normal equations
    #[serde(default = "default_l2_penalty")]
    pub l2_penalty: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            l2_penalty: default_l2_penalty(),
        }
    }
}

fn default_l2_penalty() -> f64 {
    1e-3
}
