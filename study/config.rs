//! Study configuration, stored as TOML. Every key has a default, so an empty
//! file describes the standard analysis.

use crate::data::schema::{self, DERIVED_FIELDS, derived};
use crate::derivation::DerivationError;
use crate::derivation::allostatic::AllostaticVariant;
use crate::derivation::outcome::OutcomeDefinition;
use crate::survey::design::DesignSpec;
use crate::survey::logistic::FitOptions;
use crate::survey::models::SplineSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Separator must be a single ASCII character, got {0:?}.")]
    InvalidSeparator(String),
    #[error("Primary outcome '{0}' is not one of the configured outcome definitions.")]
    UnknownPrimaryOutcome(String),
    #[error("Outcome name '{0}' is defined more than once.")]
    DuplicateOutcome(String),
    #[error("Outcome name '{0}' is already a derived column. Pick another name.")]
    ReservedOutcomeName(String),
    #[error("Outcome name '{0}' is a raw survey field. Pick another name.")]
    OutcomeShadowsRawField(String),
    #[error(transparent)]
    InvalidOutcome(#[from] DerivationError),
    #[error("Spline degree must be at least 1, but was {0}.")]
    InvalidSplineDegree(usize),
}

// Derived names an outcome definition may fill.
const OUTCOME_SLOTS: [&str; 2] = [derived::CANCER_SELF_REPORT, derived::CANCER_ANY_SITE];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Field separator of the input extract and of `derived.tsv`.
    pub separator: String,
    pub allostatic_variant: AllostaticVariant,
    pub primary_outcome: String,
    pub outcomes: Vec<OutcomeDefinition>,
    pub design: DesignSpec,
    pub spline: SplineSettings,
    pub fit: FitOptions,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("survey.tsv"),
            output_dir: PathBuf::from("results"),
            separator: "\t".to_string(),
            allostatic_variant: AllostaticVariant::default(),
            primary_outcome: derived::CANCER_ANY_SITE.to_string(),
            outcomes: vec![OutcomeDefinition::self_report(), OutcomeDefinition::any_site()],
            design: DesignSpec::default(),
            spline: SplineSettings::default(),
            fit: FitOptions::default(),
        }
    }
}

impl StudyConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: StudyConfig = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    pub fn separator_byte(&self) -> Result<u8, ConfigError> {
        match self.separator.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(ConfigError::InvalidSeparator(self.separator.clone())),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.separator_byte()?;
        for (i, outcome) in self.outcomes.iter().enumerate() {
            outcome.validate()?;
            if schema::lookup(&outcome.name).is_some() {
                return Err(ConfigError::OutcomeShadowsRawField(outcome.name.clone()));
            }
            let name = outcome.name.as_str();
            if DERIVED_FIELDS.contains(&name) && !OUTCOME_SLOTS.contains(&name) {
                return Err(ConfigError::ReservedOutcomeName(outcome.name.clone()));
            }
            if self.outcomes[..i].iter().any(|o| o.name == outcome.name) {
                return Err(ConfigError::DuplicateOutcome(outcome.name.clone()));
            }
        }
        if !self.outcomes.iter().any(|o| o.name == self.primary_outcome) {
            return Err(ConfigError::UnknownPrimaryOutcome(self.primary_outcome.clone()));
        }
        if self.spline.degree < 1 {
            return Err(ConfigError::InvalidSplineDegree(self.spline.degree));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::outcome::OutcomeMode;

    #[test]
    fn empty_file_gives_defaults() {
        let config: StudyConfig = toml::from_str("").unwrap();
        assert_eq!(config, StudyConfig::default());
        assert_eq!(config.separator_byte().unwrap(), b'\t');
        assert_eq!(config.allostatic_variant, AllostaticVariant::Eight);
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_overrides_named_keys() {
        let config: StudyConfig = toml::from_str(
            r#"
            separator = ","
            allostatic_variant = "six"
            primary_outcome = "cancer_self_report"

            [design]
            cluster = "psu"

            [fit]
            max_iterations = 10
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.separator_byte().unwrap(), b',');
        assert_eq!(config.allostatic_variant, AllostaticVariant::Six);
        assert_eq!(config.design.cluster, "psu");
        assert_eq!(config.design.stratum, "stratum_id");
        assert_eq!(config.fit.max_iterations, 10);
        assert_eq!(config.fit.min_rows, 20);
    }

    #[test]
    fn custom_outcome_definitions() {
        let config: StudyConfig = toml::from_str(
            r#"
            primary_outcome = "cancer_womens"

            [[outcomes]]
            name = "cancer_womens"
            mode = "any_positive"
            fields = ["cancer_cervix", "cancer_breast"]
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.outcomes.len(), 1);
        assert_eq!(config.outcomes[0].mode, OutcomeMode::AnyPositive);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let config = StudyConfig {
            separator: "::".to_string(),
            ..StudyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSeparator(_))));

        let config = StudyConfig {
            primary_outcome: "cancer_unknown".to_string(),
            ..StudyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownPrimaryOutcome(_))
        ));

        let mut config = StudyConfig::default();
        config.outcomes.push(OutcomeDefinition::any_site());
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateOutcome(_))));
    }

    #[test]
    fn outcome_names_cannot_reuse_columns() {
        let renamed = |name: &str| {
            let mut config = StudyConfig::default();
            config.outcomes[1].name = name.to_string();
            config.primary_outcome = name.to_string();
            config.validate()
        };
        assert!(matches!(
            renamed("cancer_history"),
            Err(ConfigError::OutcomeShadowsRawField(ref n)) if n == "cancer_history"
        ));
        assert!(matches!(
            renamed("svi_score"),
            Err(ConfigError::ReservedOutcomeName(ref n)) if n == "svi_score"
        ));
        assert!(matches!(
            renamed("allostatic_load_score"),
            Err(ConfigError::ReservedOutcomeName(_))
        ));
        renamed("cancer_breast_or_cervix").unwrap();
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.toml");
        let config = StudyConfig {
            allostatic_variant: AllostaticVariant::Seven,
            ..StudyConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(StudyConfig::load(&path).unwrap(), config);
    }
}
