//! The study's model set: two baseline models and their sensitivity checks.

use crate::data::schema::{demography, derived};
use crate::survey::basis::KnotStrategy;
use crate::survey::design::WeightPreference;
use crate::survey::runner::{ModelRole, ModelSpec};
use crate::survey::terms::Term;
use serde::{Deserialize, Serialize};

pub const PHYSIOLOGICAL: &str = "physiological";
pub const ORAL: &str = "oral";
pub const ORAL_DENTATE: &str = "oral_dentate";
pub const ORAL_AGE_INTERACTION: &str = "oral_age_interaction";
pub const PHYSIOLOGICAL_SPLINE: &str = "physiological_spline";
pub const ORAL_SELF_REPORT: &str = "oral_self_report";
pub const COMBINED: &str = "combined";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplineSettings {
    pub internal_knots: usize,
    pub degree: usize,
    pub strategy: KnotStrategy,
}

impl Default for SplineSettings {
    fn default() -> Self {
        Self {
            internal_knots: 3,
            degree: 3,
            strategy: KnotStrategy::Uniform,
        }
    }
}

/// Sex, age, smoking, education and residence zone.
pub fn adjustment_terms() -> Vec<Term> {
    vec![
        Term::categorical(derived::SEX_LABEL),
        Term::continuous(demography::AGE),
        Term::continuous(derived::SMOKER),
        Term::continuous(derived::HIGHER_EDUCATION),
        Term::categorical(derived::ZONE_LABEL),
    ]
}

fn model(
    name: &str,
    role: ModelRole,
    outcome: &str,
    exposures: Vec<Term>,
    weight: WeightPreference,
) -> ModelSpec {
    ModelSpec {
        name: name.to_string(),
        outcome: outcome.to_string(),
        exposures,
        adjustments: adjustment_terms(),
        weight,
        subpopulation: None,
        role,
    }
}

pub fn study_models(primary_outcome: &str, spline: &SplineSettings) -> Vec<ModelSpec> {
    use ModelRole::{Baseline, Sensitivity};
    use WeightPreference::{Dental, General};

    let load = || Term::continuous(derived::ALLOSTATIC_LOAD);
    let teeth = || Term::continuous(derived::MISSING_TEETH);

    let mut dentate = model(ORAL_DENTATE, Sensitivity, primary_outcome, vec![teeth()], Dental);
    dentate.subpopulation = Some(derived::NOT_EDENTULOUS.to_string());

    vec![
        model(PHYSIOLOGICAL, Baseline, primary_outcome, vec![load()], General),
        model(ORAL, Baseline, primary_outcome, vec![teeth()], Dental),
        dentate,
        model(
            ORAL_AGE_INTERACTION,
            Sensitivity,
            primary_outcome,
            vec![
                teeth(),
                Term::interaction(derived::MISSING_TEETH, demography::AGE),
            ],
            Dental,
        ),
        model(
            PHYSIOLOGICAL_SPLINE,
            Sensitivity,
            primary_outcome,
            vec![Term::Spline {
                column: derived::ALLOSTATIC_LOAD.to_string(),
                internal_knots: spline.internal_knots,
                degree: spline.degree,
                strategy: spline.strategy,
            }],
            General,
        ),
        model(
            ORAL_SELF_REPORT,
            Sensitivity,
            derived::CANCER_SELF_REPORT,
            vec![teeth()],
            Dental,
        ),
        model(
            COMBINED,
            Sensitivity,
            primary_outcome,
            vec![
                load(),
                teeth(),
                Term::continuous(derived::SVI_SCORE),
            ],
            Dental,
        ),
    ]
}
