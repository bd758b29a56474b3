//! Survey-weighted logistic regression for the study model set.

pub mod basis;
pub mod design;
pub mod logistic;
pub mod models;
pub mod runner;
pub mod terms;
pub mod types;

pub use design::{BoundDesign, DesignError, DesignSpec, WeightPreference};
pub use logistic::{FitError, FitOptions};
pub use runner::{ModelOutcome, ModelRole, ModelSet, ModelSpec, RunnerError, run_models};
