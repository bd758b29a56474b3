//! Allostatic load: the count of physiological systems in a high-risk state.

use crate::data::schema::derived;
use crate::data::table::{Column, SurveyTable};
use crate::derivation::DerivationError;
use crate::derivation::composite::{Aggregation, CompositeIndex};
use crate::derivation::risk::RiskSystem;
use serde::{Deserialize, Serialize};

/// Which systems enter the score. Later survey waves measured more systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AllostaticVariant {
    Six,
    Seven,
    #[default]
    Eight,
}

impl AllostaticVariant {
    pub fn components(self) -> &'static [RiskSystem] {
        use RiskSystem::*;
        const SIX: [RiskSystem; 6] = [BloodPressure, TotalCholesterol, Hdl, Glycemia, Waist, Crp];
        const SEVEN: [RiskSystem; 7] = [
            BloodPressure,
            TotalCholesterol,
            Hdl,
            Glycemia,
            Waist,
            Crp,
            Pulse,
        ];
        match self {
            AllostaticVariant::Six => &SIX,
            AllostaticVariant::Seven => &SEVEN,
            AllostaticVariant::Eight => &RiskSystem::ALL,
        }
    }

    pub fn size(self) -> usize {
        self.components().len()
    }

    /// Missing indicators tolerated before the score is nulled.
    pub fn max_missing(self) -> usize {
        match self {
            AllostaticVariant::Six | AllostaticVariant::Seven => 3,
            AllostaticVariant::Eight => 4,
        }
    }

    pub fn index(self) -> CompositeIndex {
        CompositeIndex {
            name: derived::ALLOSTATIC_LOAD,
            components: self.components().iter().map(|s| s.column_name()).collect(),
            aggregation: Aggregation::Sum,
            max_missing: self.max_missing(),
        }
    }
}

/// Returns all eight risk indicator columns followed by the score of the
/// chosen variant. Systems outside the variant are still emitted so that the
/// derived table has the same shape for every variant.
///
/// A variant that counts a system the extract never measured is an error:
/// scoring it would count every respondent as missing that system and null
/// the score wherever the tolerance runs out.
pub fn derive_allostatic(
    raw: &SurveyTable,
    variant: AllostaticVariant,
) -> Result<SurveyTable, DerivationError> {
    let mut out = SurveyTable::with_rows(raw.n_rows());
    let mut unavailable = Vec::new();
    for system in RiskSystem::ALL {
        let column = system.rule().evaluate(raw)?;
        if !column.available && variant.components().contains(&system) {
            unavailable.push(system.column_name());
        }
        out.push_column(system.column_name(), Column::Numeric(column.values))?;
    }
    if !unavailable.is_empty() {
        return Err(DerivationError::UnavailableSystems {
            variant: variant.size(),
            systems: unavailable.join(", "),
        });
    }

    let score = variant.index().compute(&out)?;
    let scored = score.iter().filter(|s| s.is_some()).count();
    log::info!(
        "Allostatic load ({} systems, tolerance {}): scored {} of {} respondents.",
        variant.size(),
        variant.max_missing(),
        scored,
        raw.n_rows()
    );
    out.push_column(derived::ALLOSTATIC_LOAD, Column::Numeric(score))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_panel(values: [f64; 8]) -> SurveyTable {
        let mut table = SurveyTable::with_rows(1);
        for (system, value) in RiskSystem::ALL.iter().zip(values) {
            table
                .push_column(system.column_name(), Column::Numeric(vec![Some(value)]))
                .unwrap();
        }
        table
    }

    #[test]
    fn variants_nest() {
        assert_eq!(AllostaticVariant::Six.size(), 6);
        assert_eq!(AllostaticVariant::Seven.size(), 7);
        assert_eq!(AllostaticVariant::Eight.size(), 8);
        let six = AllostaticVariant::Six.components();
        assert_eq!(&AllostaticVariant::Seven.components()[..6], six);
        assert_eq!(AllostaticVariant::default(), AllostaticVariant::Eight);
    }

    #[test]
    fn score_is_monotone_and_bounded() {
        for variant in [
            AllostaticVariant::Six,
            AllostaticVariant::Seven,
            AllostaticVariant::Eight,
        ] {
            let index = variant.index();
            let mut previous = 0.0;
            for raised in 0..=8 {
                let mut values = [0.0; 8];
                values.iter_mut().take(raised).for_each(|v| *v = 1.0);
                let score = index.compute(&full_panel(values)).unwrap()[0].unwrap();
                assert!(score >= previous);
                assert!(score >= 0.0 && score <= variant.size() as f64);
                previous = score;
            }
            assert_eq!(previous, variant.size() as f64);
        }
    }

    #[test]
    fn tolerance_is_per_variant() {
        // Only bp, cholesterol, hdl and glycemia observed.
        let mut table = SurveyTable::with_rows(1);
        for (i, system) in RiskSystem::ALL.iter().enumerate() {
            let value = if i < 4 { Some(1.0) } else { None };
            table
                .push_column(system.column_name(), Column::Numeric(vec![value]))
                .unwrap();
        }
        // Six: 2 missing; seven: 3 missing; eight: 4 missing. All within tolerance.
        for variant in [
            AllostaticVariant::Six,
            AllostaticVariant::Seven,
            AllostaticVariant::Eight,
        ] {
            assert_eq!(variant.index().compute(&table).unwrap()[0], Some(4.0));
        }

        let mut sparse = SurveyTable::with_rows(1);
        for (i, system) in RiskSystem::ALL.iter().enumerate() {
            let value = if i < 3 { Some(1.0) } else { None };
            sparse
                .push_column(system.column_name(), Column::Numeric(vec![value]))
                .unwrap();
        }
        assert_eq!(AllostaticVariant::Six.index().compute(&sparse).unwrap()[0], Some(3.0));
        assert_eq!(AllostaticVariant::Seven.index().compute(&sparse).unwrap()[0], None);
        assert_eq!(AllostaticVariant::Eight.index().compute(&sparse).unwrap()[0], None);
    }

    // A six-system extract: no pulse or creatinine columns at all.
    fn six_system_extract(rows: Vec<[Option<f64>; 9]>) -> SurveyTable {
        let names = [
            "sex",
            "sbp_1",
            "dbp_1",
            "total_cholesterol",
            "hdl_cholesterol",
            "hba1c",
            "waist_cm",
            "crp",
            "med_hypertension",
        ];
        let columns: Vec<(String, Column)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values = rows.iter().map(|row| row[i]).collect();
                (name.to_string(), Column::Numeric(values))
            })
            .collect();
        SurveyTable::from_columns(columns).unwrap()
    }

    #[test]
    fn derive_emits_every_system_column() {
        let raw = six_system_extract(vec![[
            Some(2.0),
            Some(150.0),
            Some(80.0),
            Some(150.0),
            Some(60.0),
            Some(5.0),
            Some(80.0),
            None,
            None,
        ]]);
        let out = derive_allostatic(&raw, AllostaticVariant::Six).unwrap();
        assert_eq!(out.n_columns(), 9);
        assert_eq!(out.column(derived::RISK_CRP).unwrap().numeric(0), None);
        assert_eq!(out.column(derived::RISK_PULSE).unwrap().numeric(0), None);
        assert_eq!(out.column(derived::RISK_BP).unwrap().numeric(0), Some(1.0));
        assert_eq!(
            out.column(derived::ALLOSTATIC_LOAD).unwrap().numeric(0),
            Some(1.0)
        );
    }

    #[test]
    fn six_system_extract_under_each_variant() {
        // Male with high bp, high cholesterol and low hdl; glycemia, waist and
        // crp unmeasured for him.
        let raw = six_system_extract(vec![
            [
                Some(1.0),
                Some(150.0),
                Some(95.0),
                Some(220.0),
                Some(30.0),
                None,
                None,
                None,
                None,
            ],
            [
                Some(2.0),
                Some(120.0),
                Some(70.0),
                Some(180.0),
                Some(60.0),
                Some(5.4),
                Some(80.0),
                Some(1.0),
                None,
            ],
        ]);

        let out = derive_allostatic(&raw, AllostaticVariant::Six).unwrap();
        let score = out.column(derived::ALLOSTATIC_LOAD).unwrap();
        assert_eq!(score.numeric(0), Some(3.0));
        assert_eq!(score.numeric(1), Some(0.0));

        for (variant, absent) in [
            (AllostaticVariant::Seven, "risk_pulse"),
            (AllostaticVariant::Eight, "risk_pulse, risk_creatinine"),
        ] {
            match derive_allostatic(&raw, variant) {
                Err(DerivationError::UnavailableSystems { variant: size, systems }) => {
                    assert_eq!(size, variant.size());
                    assert_eq!(systems, absent);
                }
                other => panic!(
                    "Expected UnavailableSystems, got {:?}",
                    other.map(|t| t.n_columns())
                ),
            }
        }
    }
}
