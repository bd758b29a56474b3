//! # Derived-variable engine
//!
//! Runs every derivation against the raw table in a fixed order and appends
//! their columns once. No derivation reads another's output, so the order
//! only fixes the column layout of the derived table.

use crate::data::schema::DERIVED_FIELDS;
use crate::data::table::{Column, SurveyTable};
use crate::derivation::allostatic::{AllostaticVariant, derive_allostatic};
use crate::derivation::covariates::derive_covariates;
use crate::derivation::outcome::OutcomeDefinition;
use crate::derivation::svi::derive_svi;
use crate::derivation::teeth::derive_teeth;
use crate::derivation::{DataQualityNote, DerivationError};

#[derive(Debug, Clone)]
pub struct DerivationEngine {
    pub variant: AllostaticVariant,
    pub outcomes: Vec<OutcomeDefinition>,
}

impl Default for DerivationEngine {
    fn default() -> Self {
        Self {
            variant: AllostaticVariant::default(),
            outcomes: vec![OutcomeDefinition::self_report(), OutcomeDefinition::any_site()],
        }
    }
}

/// The derived columns alone, plus any values that were rejected on the way.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub columns: SurveyTable,
    pub notes: Vec<DataQualityNote>,
}

impl DerivationEngine {
    pub fn new(variant: AllostaticVariant, outcomes: Vec<OutcomeDefinition>) -> Self {
        Self { variant, outcomes }
    }

    pub fn derive(&self, raw: &SurveyTable) -> Result<Derivation, DerivationError> {
        if let Some(name) = raw.field_names().find(|name| self.is_derived_name(name)) {
            return Err(DerivationError::DerivedFieldInRaw(name.to_string()));
        }

        log::info!(
            "Deriving variables for {} respondents ({} raw fields).",
            raw.n_rows(),
            raw.n_columns()
        );

        let mut columns = derive_svi(raw)?;
        columns = columns.append(&derive_allostatic(raw, self.variant)?)?;

        let (teeth, notes) = derive_teeth(raw)?;
        columns = columns.append(&teeth)?;

        for definition in &self.outcomes {
            let values = definition.evaluate(raw)?;
            columns.push_column(definition.name.clone(), Column::Numeric(values))?;
        }

        columns = columns.append(&derive_covariates(raw)?)?;

        log::info!(
            "Derived {} columns with {} data-quality note(s).",
            columns.n_columns(),
            notes.len()
        );
        Ok(Derivation { columns, notes })
    }

    /// Raw table with the derived columns appended.
    pub fn apply(&self, raw: &SurveyTable) -> Result<SurveyTable, DerivationError> {
        let derivation = self.derive(raw)?;
        Ok(raw.append(&derivation.columns)?)
    }

    fn is_derived_name(&self, name: &str) -> bool {
        DERIVED_FIELDS.contains(&name) || self.outcomes.iter().any(|o| o.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::derived;

    fn raw() -> SurveyTable {
        let numeric = |name: &str, values: Vec<Option<f64>>| (name.to_string(), Column::Numeric(values));
        SurveyTable::from_columns(vec![
            numeric("household_income", vec![Some(100_000.0), Some(300_000.0), None]),
            numeric("education_level", vec![Some(2.0), Some(5.0), None]),
            numeric("crowding_index", vec![Some(3.0), Some(1.0), Some(1.0)]),
            numeric("sbp_1", vec![Some(150.0), Some(118.0), None]),
            numeric("dbp_1", vec![Some(80.0), Some(70.0), None]),
            numeric("total_cholesterol", vec![Some(210.0), Some(160.0), None]),
            numeric("hdl_cholesterol", vec![Some(35.0), Some(60.0), None]),
            numeric("hba1c", vec![Some(7.0), Some(5.2), None]),
            numeric("waist_cm", vec![Some(110.0), Some(80.0), None]),
            numeric("crp", vec![Some(1.0), Some(1.0), None]),
            numeric("pulse_1", vec![Some(70.0), Some(70.0), None]),
            numeric("creatinine", vec![Some(0.9), Some(0.8), None]),
            numeric("teeth_total_adjusted", vec![Some(20.0), Some(32.0), Some(0.0)]),
            numeric("cancer_history", vec![Some(1.0), Some(2.0), None]),
            numeric("cancer_breast", vec![None, Some(2.0), None]),
            numeric("cancer_prostate", vec![Some(1.0), None, None]),
            numeric("sex", vec![Some(1.0), Some(2.0), Some(2.0)]),
            numeric("age", vec![Some(60.0), Some(30.0), Some(80.0)]),
            numeric("zone", vec![Some(1.0), Some(2.0), Some(1.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn derives_every_documented_column() {
        let derivation = DerivationEngine::default().derive(&raw()).unwrap();
        for name in DERIVED_FIELDS {
            assert!(derivation.columns.has_field(name), "missing {name}");
        }
        assert_eq!(derivation.columns.n_columns(), DERIVED_FIELDS.len());

        let al = derivation.columns.column(derived::ALLOSTATIC_LOAD).unwrap();
        // Respondent 0: bp, cholesterol, hdl, glycemia and waist all high; crp,
        // pulse and creatinine normal.
        assert_eq!(al.numeric(0), Some(5.0));
        assert_eq!(al.numeric(1), Some(0.0));
        assert_eq!(al.numeric(2), None);

        let outcome = derivation.columns.column(derived::CANCER_ANY_SITE).unwrap();
        assert_eq!(outcome.numeric(0), Some(1.0));
        assert_eq!(outcome.numeric(1), Some(0.0));
        assert_eq!(outcome.numeric(2), None);
    }

    #[test]
    fn engine_is_idempotent() {
        let engine = DerivationEngine::default();
        let table = raw();
        let first = engine.apply(&table).unwrap();
        let second = engine.apply(&table).unwrap();
        let names: Vec<&str> = first.field_names().collect();
        assert_eq!(names, second.field_names().collect::<Vec<_>>());
        for (name, column) in first.iter() {
            assert_eq!(Some(column), second.get(name));
        }
    }

    #[test]
    fn derived_names_in_raw_data_are_rejected() {
        let engine = DerivationEngine::default();
        let derived_once = engine.apply(&raw()).unwrap();
        match engine.derive(&derived_once) {
            Err(DerivationError::DerivedFieldInRaw(name)) => assert_eq!(name, derived::INCOME_VULN),
            other => panic!("Expected DerivedFieldInRaw, got {:?}", other.map(|d| d.notes)),
        }
    }

    #[test]
    fn variant_must_match_the_measured_systems() {
        let full = raw();
        let six_systems = full
            .select(full.field_names().filter(|name| !["pulse_1", "creatinine"].contains(name)))
            .unwrap();
        let six = DerivationEngine {
            variant: AllostaticVariant::Six,
            ..DerivationEngine::default()
        };
        let al = six.apply(&six_systems).unwrap();
        let al = al.column(derived::ALLOSTATIC_LOAD).unwrap();
        assert_eq!(al.numeric(0), Some(5.0));

        match DerivationEngine::default().derive(&six_systems) {
            Err(DerivationError::UnavailableSystems { variant, systems }) => {
                assert_eq!(variant, 8);
                assert_eq!(systems, "risk_pulse, risk_creatinine");
            }
            other => panic!("Expected UnavailableSystems, got {:?}", other.map(|d| d.notes)),
        }
    }
}
