//! Wattline: Building Energy Waste Detection
//!
//! Batch engine that models expected energy consumption per building and
//! flags statistically abnormal excess usage, priced at a flat unit rate.
//!
//! ## Architecture
//!
//! - **Feature Builder**: calendar/cyclical encodings plus causally-safe
//!   per-building lag and rolling statistics
//! - **Temporal Split**: global time cut so the model never trains on the
//!   future of an evaluation row
//! - **Oracle Adapter**: pluggable fit/predict regression collaborator with
//!   a verbatim feature-schema contract
//! - **Residual Engine**: per-building dynamic thresholds (sigma × residual
//!   stddev), positive-deviation-only classification
//! - **Waste Ranker**: energy/cost translation, top-N report by impact

pub mod config;
pub mod detection;
pub mod features;
pub mod ingest;
pub mod oracle;
pub mod pipeline;
pub mod report;
pub mod split;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, PipelineConfig};

// Re-export commonly used types
pub use types::{
    AnomalyCandidate, AnomalyRecord, AnomalyReport, EntityThreshold, FeatureFrame,
    FeatureSchema, Reading, ReadingTable, RunSummary,
};

// Re-export component entry points
pub use detection::{detect_anomalies, DetectionOutcome};
pub use features::{build_features, FeatureError};
pub use ingest::{load_readings, IngestError};
pub use oracle::{check_schema, EnergyOracle, OracleError, RidgeOracle};
pub use pipeline::{PipelineError, PipelineOutcome};
pub use report::quantify_and_rank;
pub use split::temporal_split;
