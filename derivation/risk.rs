//! # Binary risk indicators
//!
//! One indicator per physiological system. Each system reads one or more
//! measurements (each possibly taken in replicate), compares them with fixed
//! clinical cut-offs, and, where the survey asks about it, counts current
//! treatment as high risk regardless of the measured value.
//!
//! Three-valued logic per respondent:
//! - no measurement observed: missing, even for treated respondents;
//! - any observed measurement past its cut-off, or on treatment: 1;
//! - every measurement observed and none past its cut-off: 0;
//! - otherwise (some unobserved, none past the cut-off): missing.

use crate::data::schema::{biomarkers, demography, derived, medication};
use crate::data::table::SurveyTable;
use crate::derivation::DerivationError;
use crate::derivation::codes::{self, Sex};
use crate::derivation::resolve::{Source, SourceChain};

pub const SYSTOLIC_CUTOFF: f64 = 140.0;
pub const DIASTOLIC_CUTOFF: f64 = 90.0;
pub const TOTAL_CHOLESTEROL_CUTOFF: f64 = 200.0;
pub const HDL_CUTOFF_MALE: f64 = 40.0;
pub const HDL_CUTOFF_FEMALE: f64 = 50.0;
pub const HBA1C_CUTOFF: f64 = 6.5;
pub const WAIST_CUTOFF_MALE: f64 = 102.0;
pub const WAIST_CUTOFF_FEMALE: f64 = 88.0;
pub const CRP_CUTOFF: f64 = 3.0;
pub const PULSE_CUTOFF: f64 = 90.0;
pub const CREATININE_CUTOFF_MALE: f64 = 1.2;
pub const CREATININE_CUTOFF_FEMALE: f64 = 1.0;

/// Direction of a clinical cut-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    AtLeast(f64),
    Above(f64),
    Below(f64),
}

impl Bound {
    pub fn crossed(self, value: f64) -> bool {
        match self {
            Bound::AtLeast(t) => value >= t,
            Bound::Above(t) => value > t,
            Bound::Below(t) => value < t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cut {
    Fixed(Bound),
    BySex { male: Bound, female: Bound },
}

impl Cut {
    /// `None` when the cut-off depends on sex and sex is unknown.
    pub fn crossed(self, value: f64, sex: Option<Sex>) -> Option<bool> {
        match self {
            Cut::Fixed(bound) => Some(bound.crossed(value)),
            Cut::BySex { male, female } => sex.map(|s| match s {
                Sex::Male => male.crossed(value),
                Sex::Female => female.crossed(value),
            }),
        }
    }
}

/// A measurement averaged over whichever of its replicates were taken.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub label: &'static str,
    pub replicates: Vec<SourceChain>,
    pub cut: Cut,
}

impl Measurement {
    fn single(label: &'static str, field: &str, cut: Cut) -> Self {
        Self {
            label,
            replicates: vec![SourceChain::single(field)],
            cut,
        }
    }

    fn replicated(label: &'static str, fields: &[&str], cut: Cut) -> Self {
        Self {
            label,
            replicates: fields.iter().map(|f| SourceChain::single(f)).collect(),
            cut,
        }
    }

    /// Per-respondent mean of the observed replicates, or `None` when no
    /// replicate field exists in the table.
    fn readings(&self, raw: &SurveyTable) -> Result<Option<Vec<Option<f64>>>, DerivationError> {
        let mut present = Vec::with_capacity(self.replicates.len());
        for chain in &self.replicates {
            let resolution = chain.evaluate(raw)?;
            if !resolution.is_absent() {
                present.push(resolution.values);
            }
        }
        if present.is_empty() {
            return Ok(None);
        }

        let means = (0..raw.n_rows())
            .map(|row| {
                let observed: Vec<f64> = present.iter().filter_map(|r| r[row]).collect();
                if observed.is_empty() {
                    None
                } else {
                    Some(observed.iter().sum::<f64>() / observed.len() as f64)
                }
            })
            .collect();
        Ok(Some(means))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskSystem {
    BloodPressure,
    TotalCholesterol,
    Hdl,
    Glycemia,
    Waist,
    Crp,
    Pulse,
    Creatinine,
}

impl RiskSystem {
    pub const ALL: [RiskSystem; 8] = [
        RiskSystem::BloodPressure,
        RiskSystem::TotalCholesterol,
        RiskSystem::Hdl,
        RiskSystem::Glycemia,
        RiskSystem::Waist,
        RiskSystem::Crp,
        RiskSystem::Pulse,
        RiskSystem::Creatinine,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            RiskSystem::BloodPressure => derived::RISK_BP,
            RiskSystem::TotalCholesterol => derived::RISK_TOTAL_CHOLESTEROL,
            RiskSystem::Hdl => derived::RISK_HDL,
            RiskSystem::Glycemia => derived::RISK_GLYCEMIA,
            RiskSystem::Waist => derived::RISK_WAIST,
            RiskSystem::Crp => derived::RISK_CRP,
            RiskSystem::Pulse => derived::RISK_PULSE,
            RiskSystem::Creatinine => derived::RISK_CREATININE,
        }
    }

    pub fn rule(self) -> RiskRule {
        use Bound::{Above, AtLeast, Below};

        let (measurements, medication) = match self {
            RiskSystem::BloodPressure => (
                vec![
                    Measurement::replicated(
                        "systolic",
                        &biomarkers::SYSTOLIC,
                        Cut::Fixed(AtLeast(SYSTOLIC_CUTOFF)),
                    ),
                    Measurement::replicated(
                        "diastolic",
                        &biomarkers::DIASTOLIC,
                        Cut::Fixed(AtLeast(DIASTOLIC_CUTOFF)),
                    ),
                ],
                Some(medication::HYPERTENSION),
            ),
            RiskSystem::TotalCholesterol => (
                vec![Measurement::single(
                    "total cholesterol",
                    biomarkers::TOTAL_CHOLESTEROL,
                    Cut::Fixed(AtLeast(TOTAL_CHOLESTEROL_CUTOFF)),
                )],
                Some(medication::LIPIDS),
            ),
            RiskSystem::Hdl => (
                vec![Measurement::single(
                    "hdl cholesterol",
                    biomarkers::HDL_CHOLESTEROL,
                    Cut::BySex {
                        male: Below(HDL_CUTOFF_MALE),
                        female: Below(HDL_CUTOFF_FEMALE),
                    },
                )],
                None,
            ),
            RiskSystem::Glycemia => (
                vec![Measurement {
                    label: "hba1c",
                    replicates: vec![SourceChain::new(
                        biomarkers::HBA1C,
                        vec![
                            Source::field(biomarkers::HBA1C),
                            Source::field(biomarkers::HBA1C_REPORTED),
                        ],
                    )],
                    cut: Cut::Fixed(AtLeast(HBA1C_CUTOFF)),
                }],
                Some(medication::DIABETES),
            ),
            RiskSystem::Waist => (
                vec![Measurement::single(
                    "waist circumference",
                    biomarkers::WAIST,
                    Cut::BySex {
                        male: AtLeast(WAIST_CUTOFF_MALE),
                        female: AtLeast(WAIST_CUTOFF_FEMALE),
                    },
                )],
                None,
            ),
            RiskSystem::Crp => (
                vec![Measurement::single(
                    "crp",
                    biomarkers::CRP,
                    Cut::Fixed(AtLeast(CRP_CUTOFF)),
                )],
                None,
            ),
            RiskSystem::Pulse => (
                vec![Measurement::replicated(
                    "resting pulse",
                    &biomarkers::PULSE,
                    Cut::Fixed(AtLeast(PULSE_CUTOFF)),
                )],
                None,
            ),
            RiskSystem::Creatinine => (
                vec![Measurement::single(
                    "creatinine",
                    biomarkers::CREATININE,
                    Cut::BySex {
                        male: Above(CREATININE_CUTOFF_MALE),
                        female: Above(CREATININE_CUTOFF_FEMALE),
                    },
                )],
                None,
            ),
        };

        RiskRule {
            system: self,
            measurements,
            medication,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskRule {
    pub system: RiskSystem,
    pub measurements: Vec<Measurement>,
    pub medication: Option<&'static str>,
}

/// A derived indicator column plus whether any source existed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskColumn {
    pub values: Vec<Option<f64>>,
    pub available: bool,
}

impl RiskRule {
    pub fn evaluate(&self, raw: &SurveyTable) -> Result<RiskColumn, DerivationError> {
        let n_rows = raw.n_rows();

        let mut readings = Vec::with_capacity(self.measurements.len());
        for measurement in &self.measurements {
            match measurement.readings(raw)? {
                Some(values) => readings.push((measurement.cut, values)),
                None => log::info!(
                    "{}: measurement '{}' not collected in this extract.",
                    self.system.column_name(),
                    measurement.label
                ),
            }
        }
        if readings.is_empty() {
            log::warn!(
                "{}: no measurement available; indicator is missing for all respondents.",
                self.system.column_name()
            );
            return Ok(RiskColumn {
                values: vec![None; n_rows],
                available: false,
            });
        }

        let sex_column = raw.get(demography::SEX);
        let medication_column = self.medication.and_then(|field| raw.get(field));

        let values = (0..n_rows)
            .map(|row| {
                if readings.iter().all(|(_, values)| values[row].is_none()) {
                    return None;
                }
                let sex = Sex::from_code(sex_column.and_then(|c| c.numeric(row)));
                let on_treatment = medication_column
                    .is_some_and(|c| codes::yes_no(c.numeric(row)) == Some(true));

                let crossings: Vec<Option<bool>> = readings
                    .iter()
                    .map(|(cut, values)| values[row].and_then(|v| cut.crossed(v, sex)))
                    .collect();

                if on_treatment || crossings.contains(&Some(true)) {
                    Some(1.0)
                } else if crossings.iter().all(|c| *c == Some(false)) {
                    Some(0.0)
                } else {
                    None
                }
            })
            .collect();

        Ok(RiskColumn {
            values,
            available: true,
        })
    }
}
