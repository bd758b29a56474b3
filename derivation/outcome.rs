//! Cancer-history outcome definitions.

use crate::data::schema::{derived, outcome};
use crate::data::table::{Column, SurveyTable};
use crate::derivation::DerivationError;
use crate::derivation::codes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeMode {
    /// The first existing field decides.
    SingleField,
    /// Any "yes" among the existing fields decides; otherwise any "no".
    AnyPositive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeDefinition {
    pub name: String,
    pub mode: OutcomeMode,
    pub fields: Vec<String>,
}

impl OutcomeDefinition {
    /// Narrow definition: the general cancer-history question.
    pub fn self_report() -> Self {
        Self {
            name: derived::CANCER_SELF_REPORT.to_string(),
            mode: OutcomeMode::SingleField,
            fields: vec![
                outcome::CANCER_HISTORY.to_string(),
                outcome::CANCER_EVER.to_string(),
            ],
        }
    }

    /// Broad definition: any site in the sex-specific screening modules.
    pub fn any_site() -> Self {
        Self {
            name: derived::CANCER_ANY_SITE.to_string(),
            mode: OutcomeMode::AnyPositive,
            fields: outcome::WOMENS_MODULE
                .iter()
                .chain(outcome::MENS_MODULE.iter())
                .map(|f| f.to_string())
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), DerivationError> {
        let reason = if self.name.trim().is_empty() {
            Some("the name is empty")
        } else if self.fields.is_empty() {
            Some("no source fields are listed")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(DerivationError::InvalidOutcome {
                name: self.name.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn evaluate(&self, raw: &SurveyTable) -> Result<Vec<Option<f64>>, DerivationError> {
        self.validate()?;
        let existing: Vec<&Column> = self
            .fields
            .iter()
            .filter_map(|f| raw.get(f))
            .collect();
        if existing.is_empty() {
            log::warn!(
                "Outcome '{}': none of [{}] exists; outcome is missing for every respondent.",
                self.name,
                self.fields.join(", ")
            );
            return Ok(vec![None; raw.n_rows()]);
        }

        let answers = |row: usize| existing.iter().map(move |c| codes::yes_no(c.numeric(row)));
        let values = (0..raw.n_rows())
            .map(|row| {
                let answer = match self.mode {
                    OutcomeMode::SingleField => answers(row).next().flatten(),
                    OutcomeMode::AnyPositive => {
                        let mut seen_no = false;
                        let mut result = None;
                        for answer in answers(row) {
                            match answer {
                                Some(true) => {
                                    result = Some(true);
                                    break;
                                }
                                Some(false) => seen_no = true,
                                None => {}
                            }
                        }
                        result.or(seen_no.then_some(false))
                    }
                };
                codes::indicator(answer)
            })
            .collect();
        Ok(values)
    }
}
