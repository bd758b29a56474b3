//! Field names of the survey extract and of the derived columns.
//!
//! Raw names are owned by the survey agency and are never renamed by the
//! loader. Where the agency renamed a field between waves, every known name is
//! listed here and the derivation engine tries them in order.

/// Sampling design fields.
pub mod design {
    pub const CLUSTER: &str = "cluster_id";
    pub const STRATUM: &str = "stratum_id";
    /// Expansion factor for every interviewed respondent.
    pub const WEIGHT_GENERAL: &str = "weight_general";
    /// Expansion factor for the dental examination subsample.
    pub const WEIGHT_DENTAL: &str = "weight_dental";
}

pub mod socioeconomic {
    pub const HOUSEHOLD_INCOME: &str = "household_income";
    pub const EDUCATION_LEVEL: &str = "education_level";
    pub const CROWDING_INDEX: &str = "crowding_index";
}

pub mod biomarkers {
    pub const SYSTOLIC: [&str; 2] = ["sbp_1", "sbp_2"];
    pub const DIASTOLIC: [&str; 2] = ["dbp_1", "dbp_2"];
    pub const TOTAL_CHOLESTEROL: &str = "total_cholesterol";
    pub const HDL_CHOLESTEROL: &str = "hdl_cholesterol";
    pub const HBA1C: &str = "hba1c";
    /// Self-reported value, stored as a numeric-coded string.
    pub const HBA1C_REPORTED: &str = "hba1c_reported";
    pub const WAIST: &str = "waist_cm";
    pub const CRP: &str = "crp";
    pub const PULSE: [&str; 2] = ["pulse_1", "pulse_2"];
    pub const CREATININE: &str = "creatinine";
}

pub mod medication {
    pub const HYPERTENSION: &str = "med_hypertension";
    pub const LIPIDS: &str = "med_lipids";
    pub const DIABETES: &str = "med_diabetes";
}

pub mod oral {
    pub const TEETH_ADJUSTED: &str = "teeth_total_adjusted";
    pub const TEETH_UPPER: &str = "teeth_upper";
    pub const TEETH_LOWER: &str = "teeth_lower";
}

pub mod outcome {
    pub const CANCER_HISTORY: &str = "cancer_history";
    pub const CANCER_EVER: &str = "cancer_ever";
    pub const WOMENS_MODULE: [&str; 4] = [
        "cancer_cervix",
        "cancer_breast",
        "cancer_ovary",
        "cancer_uterus",
    ];
    pub const MENS_MODULE: [&str; 2] = ["cancer_prostate", "cancer_testis"];
}

pub mod demography {
    pub const SEX: &str = "sex";
    pub const AGE: &str = "age";
    pub const ZONE: &str = "zone";
}

pub mod smoking {
    pub const CURRENT: &str = "smoking_current";
    pub const STATUS: &str = "smoking_status";
    pub const TOBACCO_USE: &str = "tobacco_use";
}

/// Names of the columns appended by the derivation engine.
pub mod derived {
    pub const INCOME_VULN: &str = "income_vuln";
    pub const EDU_VULN: &str = "edu_vuln";
    pub const HOUSING_VULN: &str = "housing_vuln";
    pub const SVI_SCORE: &str = "svi_score";

    pub const RISK_BP: &str = "risk_bp";
    pub const RISK_TOTAL_CHOLESTEROL: &str = "risk_total_cholesterol";
    pub const RISK_HDL: &str = "risk_hdl";
    pub const RISK_GLYCEMIA: &str = "risk_glycemia";
    pub const RISK_WAIST: &str = "risk_waist";
    pub const RISK_CRP: &str = "risk_crp";
    pub const RISK_PULSE: &str = "risk_pulse";
    pub const RISK_CREATININE: &str = "risk_creatinine";
    pub const ALLOSTATIC_LOAD: &str = "allostatic_load_score";

    pub const TEETH_TOTAL: &str = "teeth_total";
    pub const MISSING_TEETH: &str = "missing_teeth";
    pub const NOT_EDENTULOUS: &str = "not_edentulous";

    pub const CANCER_SELF_REPORT: &str = "cancer_self_report";
    pub const CANCER_ANY_SITE: &str = "cancer_any_site";

    pub const SEX_LABEL: &str = "sex_label";
    pub const AGE_BAND: &str = "age_band";
    pub const SMOKER: &str = "smoker";
    pub const HIGHER_EDUCATION: &str = "higher_education";
    pub const ZONE_LABEL: &str = "zone_label";
}

/// Semantic type of a raw field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Identifier,
    Weight,
    Continuous,
    Ordinal,
    Code,
    NumericText,
}

impl FieldKind {
    pub fn describe(self) -> &'static str {
        match self {
            FieldKind::Identifier => "categorical identifier",
            FieldKind::Weight => "positive expansion factor",
            FieldKind::Continuous => "continuous measurement",
            FieldKind::Ordinal => "ordinal code",
            FieldKind::Code => "categorical code",
            FieldKind::NumericText => "numeric-coded string",
        }
    }
}

/// One entry of the logical schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Survey-wave dependent fields; their absence is expected in some extracts.
    pub optional: bool,
    pub domain: &'static str,
}

const fn field(name: &'static str, kind: FieldKind, optional: bool, domain: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        optional,
        domain,
    }
}

/// The raw fields the pipeline knows about.
pub const LOGICAL_SCHEMA: &[FieldSpec] = &[
    field(design::CLUSTER, FieldKind::Identifier, false, "primary sampling unit"),
    field(design::STRATUM, FieldKind::Identifier, false, "design stratum"),
    field(design::WEIGHT_GENERAL, FieldKind::Weight, false, "> 0"),
    field(design::WEIGHT_DENTAL, FieldKind::Weight, true, "> 0, null outside dental subsample"),
    field(socioeconomic::HOUSEHOLD_INCOME, FieldKind::Continuous, false, "currency units"),
    field(socioeconomic::EDUCATION_LEVEL, FieldKind::Ordinal, false, "1..=5"),
    field(socioeconomic::CROWDING_INDEX, FieldKind::Continuous, false, "persons per bedroom"),
    field(biomarkers::SYSTOLIC[0], FieldKind::Continuous, false, "mmHg"),
    field(biomarkers::SYSTOLIC[1], FieldKind::Continuous, true, "mmHg"),
    field(biomarkers::DIASTOLIC[0], FieldKind::Continuous, false, "mmHg"),
    field(biomarkers::DIASTOLIC[1], FieldKind::Continuous, true, "mmHg"),
    field(biomarkers::TOTAL_CHOLESTEROL, FieldKind::Continuous, false, "mg/dL"),
    field(biomarkers::HDL_CHOLESTEROL, FieldKind::Continuous, false, "mg/dL"),
    field(biomarkers::HBA1C, FieldKind::Continuous, true, "%"),
    field(biomarkers::HBA1C_REPORTED, FieldKind::NumericText, true, "%"),
    field(biomarkers::WAIST, FieldKind::Continuous, false, "cm"),
    field(biomarkers::CRP, FieldKind::Continuous, true, "mg/L"),
    field(biomarkers::PULSE[0], FieldKind::Continuous, true, "bpm"),
    field(biomarkers::PULSE[1], FieldKind::Continuous, true, "bpm"),
    field(biomarkers::CREATININE, FieldKind::Continuous, true, "mg/dL"),
    field(medication::HYPERTENSION, FieldKind::Code, true, "1 yes, 2 no"),
    field(medication::LIPIDS, FieldKind::Code, true, "1 yes, 2 no"),
    field(medication::DIABETES, FieldKind::Code, true, "1 yes, 2 no"),
    field(oral::TEETH_ADJUSTED, FieldKind::Continuous, true, "0..=32"),
    field(oral::TEETH_UPPER, FieldKind::Continuous, true, "0..=16"),
    field(oral::TEETH_LOWER, FieldKind::Continuous, true, "0..=16"),
    field(outcome::CANCER_HISTORY, FieldKind::Code, true, "1 yes, 2 no"),
    field(outcome::CANCER_EVER, FieldKind::Code, true, "1 yes, 2 no"),
    field(outcome::WOMENS_MODULE[0], FieldKind::Code, true, "1 yes, 2 no"),
    field(outcome::WOMENS_MODULE[1], FieldKind::Code, true, "1 yes, 2 no"),
    field(outcome::WOMENS_MODULE[2], FieldKind::Code, true, "1 yes, 2 no"),
    field(outcome::WOMENS_MODULE[3], FieldKind::Code, true, "1 yes, 2 no"),
    field(outcome::MENS_MODULE[0], FieldKind::Code, true, "1 yes, 2 no"),
    field(outcome::MENS_MODULE[1], FieldKind::Code, true, "1 yes, 2 no"),
    field(demography::SEX, FieldKind::Code, false, "1 male, 2 female"),
    field(demography::AGE, FieldKind::Continuous, false, "years"),
    field(demography::ZONE, FieldKind::Code, false, "1 urban, 2 rural"),
    field(smoking::CURRENT, FieldKind::Code, true, "1 yes, 2 no"),
    field(smoking::STATUS, FieldKind::Code, true, "1 daily, 2 occasional, 3 former, 4 never"),
    field(smoking::TOBACCO_USE, FieldKind::Code, true, "1 yes, 2 no"),
];

/// Every column name the derivation engine may append. Raw data carrying any
/// of these names is rejected.
pub const DERIVED_FIELDS: &[&str] = &[
    derived::INCOME_VULN,
    derived::EDU_VULN,
    derived::HOUSING_VULN,
    derived::SVI_SCORE,
    derived::RISK_BP,
    derived::RISK_TOTAL_CHOLESTEROL,
    derived::RISK_HDL,
    derived::RISK_GLYCEMIA,
    derived::RISK_WAIST,
    derived::RISK_CRP,
    derived::RISK_PULSE,
    derived::RISK_CREATININE,
    derived::ALLOSTATIC_LOAD,
    derived::TEETH_TOTAL,
    derived::MISSING_TEETH,
    derived::NOT_EDENTULOUS,
    derived::CANCER_SELF_REPORT,
    derived::CANCER_ANY_SITE,
    derived::SEX_LABEL,
    derived::AGE_BAND,
    derived::SMOKER,
    derived::HIGHER_EDUCATION,
    derived::ZONE_LABEL,
];

pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    LOGICAL_SCHEMA.iter().find(|spec| spec.name == name)
}
