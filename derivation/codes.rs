//! Questionnaire answer codes shared by every module of the survey.

pub const YES: f64 = 1.0;
pub const NO: f64 = 2.0;
/// Some waves code "no" as zero instead of two.
pub const NO_ALTERNATE: f64 = 0.0;

/// Reads a yes/no answer. "Don't know", "refused" and skip codes are missing.
pub fn yes_no(code: Option<f64>) -> Option<bool> {
    match code {
        Some(c) if c == YES => Some(true),
        Some(c) if c == NO || c == NO_ALTERNATE => Some(false),
        _ => None,
    }
}

/// Encodes a boolean indicator as the 1/0 value stored in derived columns.
pub fn indicator(value: Option<bool>) -> Option<f64> {
    value.map(|v| if v { 1.0 } else { 0.0 })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn from_code(code: Option<f64>) -> Option<Sex> {
        match code {
            Some(c) if c == 1.0 => Some(Sex::Male),
            Some(c) if c == 2.0 => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}
