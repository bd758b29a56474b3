//! Missing-teeth count from the oral examination.

use crate::data::schema::{derived, oral};
use crate::data::table::{Column, SurveyTable};
use crate::derivation::resolve::{Source, SourceChain, sum_all};
use crate::derivation::{DataQualityNote, DerivationError};

/// Permanent dentition of an adult.
pub const FULL_DENTITION: f64 = 32.0;

pub fn teeth_chain() -> SourceChain {
    SourceChain::new(
        derived::TEETH_TOTAL,
        vec![
            Source::field(oral::TEETH_ADJUSTED),
            Source::new(&[oral::TEETH_UPPER, oral::TEETH_LOWER], sum_all),
        ],
    )
}

/// Returns `teeth_total`, `missing_teeth` and `not_edentulous`, plus a note
/// for every respondent whose recorded total was negative.
pub fn derive_teeth(
    raw: &SurveyTable,
) -> Result<(SurveyTable, Vec<DataQualityNote>), DerivationError> {
    let resolution = teeth_chain().evaluate(raw)?;
    let mut notes = Vec::new();

    let totals: Vec<Option<f64>> = resolution
        .values
        .into_iter()
        .enumerate()
        .map(|(row, total)| match total {
            Some(t) if t < 0.0 => {
                notes.push(DataQualityNote {
                    field: derived::TEETH_TOTAL,
                    row,
                    message: format!("negative tooth count {t}"),
                });
                None
            }
            other => other,
        })
        .collect();

    let missing: Vec<Option<f64>> = totals
        .iter()
        .map(|t| t.map(|total| FULL_DENTITION - total))
        .collect();
    let dentate: Vec<Option<f64>> = missing
        .iter()
        .map(|m| m.map(|count| if count < FULL_DENTITION { 1.0 } else { 0.0 }))
        .collect();

    if !notes.is_empty() {
        log::warn!(
            "{} respondent(s) with a negative tooth count; their missing-teeth value is null.",
            notes.len()
        );
    }

    let mut out = SurveyTable::with_rows(raw.n_rows());
    out.push_column(derived::TEETH_TOTAL, Column::Numeric(totals))?;
    out.push_column(derived::MISSING_TEETH, Column::Numeric(missing))?;
    out.push_column(derived::NOT_EDENTULOUS, Column::Numeric(dentate))?;
    Ok((out, notes))
}
