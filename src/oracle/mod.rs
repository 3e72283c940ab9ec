//! Prediction Oracle Adapter
//!
//! The regression model that estimates expected consumption is an external
//! collaborator: this crate fixes its fit/predict contract and treats any
//! concrete implementation as a pluggable variant behind [`EnergyOracle`].
//!
//! The binding rule is the feature schema: the column-name list (names AND
//! order) recorded at fit time must be re-supplied verbatim at predict time.
//! A mismatch is a contract violation reported as
//! [`OracleError::SchemaMismatch`] BEFORE the oracle computes anything —
//! columns are never silently reordered or dropped.
//!
//! Categorical columns are tolerated via a declared encoding convention,
//! identical between fit and predict (see [`ridge::RidgeOracle`] for the
//! reference convention).

pub mod ridge;

pub use ridge::RidgeOracle;

use crate::types::{FeatureFrame, FeatureSchema};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Feature schema mismatch: fitted on {expected:?}, asked to predict on {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Oracle has not been fitted")]
    NotFitted,

    #[error("Cannot fit on an empty feature frame")]
    EmptyTrainingSet,

    #[error("Normal equations are degenerate at column {0}; raise oracle.l2_penalty")]
    Underdetermined(usize),
}

// ============================================================================
// Oracle Contract
// ============================================================================

/// Capability-bounded regression collaborator.
///
/// `fit` records the frame's schema; `predict` must be handed a frame whose
/// schema matches it verbatim. Implementations validate the contract with
/// [`check_schema`] before touching any row.
pub trait EnergyOracle: Send {
    /// Learn from the training frame (target = measured consumption).
    fn fit(&mut self, frame: &FeatureFrame) -> Result<(), OracleError>;

    /// Expected consumption for every row of the frame.
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>, OracleError>;

    /// Feature-name list recorded at fit time; empty before the first fit.
    fn feature_names(&self) -> &[String];
}

/// Verify that a frame's columns match the fit-time schema verbatim.
///
/// Call this at the top of every `predict` implementation, before any
/// prediction is computed.
pub fn check_schema(fitted: &FeatureSchema, frame: &FeatureSchema) -> Result<(), OracleError> {
    if fitted != frame {
        return Err(OracleError::SchemaMismatch {
            expected: fitted.column_names(),
            found: frame.column_names(),
        });
    }
    Ok(())
}
