//! Derived-variable construction.
//!
//! Every derivation is a pure function from the raw table to a set of new
//! columns. The engine composes them in a fixed order and appends the result
//! to the raw table exactly once.

pub mod allostatic;
pub mod codes;
pub mod composite;
pub mod covariates;
pub mod engine;
pub mod outcome;
pub mod resolve;
pub mod risk;
pub mod svi;
pub mod teeth;

use crate::data::table::TableError;
use thiserror::Error;

pub use engine::{Derivation, DerivationEngine};

#[derive(Error, Debug)]
pub enum DerivationError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Raw table already carries derived field '{0}'. Derived columns are computed, never loaded.")]
    DerivedFieldInRaw(String),

    #[error("Outcome definition '{name}' is invalid: {reason}")]
    InvalidOutcome { name: String, reason: String },

    #[error(
        "The {variant}-system allostatic load needs {systems}, which this extract never measured. Choose a smaller allostatic_variant."
    )]
    UnavailableSystems { variant: usize, systems: String },
}

/// A per-respondent value the engine refused to use.
#[derive(Debug, Clone, PartialEq)]
pub struct DataQualityNote {
    pub field: &'static str,
    pub row: usize,
    pub message: String,
}
