//! Social Vulnerability Index.
//!
//! Three deprivation indicators (income, education, housing) averaged into a
//! 0–1 score. At least two of the three must be observed.

use crate::data::schema::{derived, socioeconomic};
use crate::data::table::{Column, SurveyTable};
use crate::derivation::DerivationError;
use crate::derivation::composite::{Aggregation, CompositeIndex};
use crate::derivation::resolve::SourceChain;

/// Household income below this line counts as income-vulnerable.
pub const INCOME_THRESHOLD: f64 = 158_145.0;
/// Education codes below this level count as education-vulnerable.
pub const EDUCATION_THRESHOLD: f64 = 3.0;
/// Crowding at or above this ratio counts as housing-vulnerable.
pub const CROWDING_THRESHOLD: f64 = 2.5;
/// More than this many missing indicators nulls the score.
pub const SVI_MAX_MISSING: usize = 1;

pub fn svi_index() -> CompositeIndex {
    CompositeIndex {
        name: derived::SVI_SCORE,
        components: vec![
            derived::INCOME_VULN,
            derived::EDU_VULN,
            derived::HOUSING_VULN,
        ],
        aggregation: Aggregation::Mean,
        max_missing: SVI_MAX_MISSING,
    }
}

/// Returns the three indicator columns followed by `svi_score`.
pub fn derive_svi(raw: &SurveyTable) -> Result<SurveyTable, DerivationError> {
    let indicators: [(&str, &str, fn(f64) -> bool); 3] = [
        (derived::INCOME_VULN, socioeconomic::HOUSEHOLD_INCOME, |x| {
            x < INCOME_THRESHOLD
        }),
        (derived::EDU_VULN, socioeconomic::EDUCATION_LEVEL, |x| {
            x < EDUCATION_THRESHOLD
        }),
        (derived::HOUSING_VULN, socioeconomic::CROWDING_INDEX, |x| {
            x >= CROWDING_THRESHOLD
        }),
    ];

    let mut out = SurveyTable::with_rows(raw.n_rows());
    for (name, field, vulnerable) in indicators {
        let resolution = SourceChain::single(field).evaluate(raw)?;
        let values = resolution
            .values
            .into_iter()
            .map(|v| v.map(|x| if vulnerable(x) { 1.0 } else { 0.0 }))
            .collect();
        out.push_column(name, Column::Numeric(values))?;
    }

    let score = svi_index().compute(&out)?;
    out.push_column(derived::SVI_SCORE, Column::Numeric(score))?;
    Ok(out)
}
