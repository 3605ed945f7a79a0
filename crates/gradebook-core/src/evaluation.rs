//! Goals, grades and evaluation records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Default goal vocabulary.
pub const DEFAULT_GOALS: [&str; 6] = [
    "Requirements",
    "Configuration Management",
    "Project Management",
    "Design",
    "Tests",
    "Refactoring",
];

/// Concept grade, ordered worst to best: `MANA < MPA < MA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    /// Goal not achieved.
    #[serde(rename = "MANA")]
    Mana,
    /// Goal partially achieved.
    #[serde(rename = "MPA")]
    Mpa,
    /// Goal achieved.
    #[serde(rename = "MA")]
    Ma,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::Mana, Grade::Mpa, Grade::Ma];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Mana => "MANA",
            Grade::Mpa => "MPA",
            Grade::Ma => "MA",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "MANA" => Ok(Grade::Mana),
            "MPA" => Ok(Grade::Mpa),
            "MA" => Ok(Grade::Ma),
            other => Err(ValidationError::InvalidGrade(other.to_string())),
        }
    }
}

/// A grade for one goal.
///
/// Owned by exactly one list of an [`Enrollment`](crate::Enrollment); only the
/// grade may change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    goal: String,
    grade: Grade,
}

impl Evaluation {
    pub fn new(goal: impl Into<String>, grade: Grade) -> Self {
        Self {
            goal: goal.into(),
            grade,
        }
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    pub fn set_grade(&mut self, grade: Grade) {
        self.grade = grade;
    }
}

/// Check `goal` against a vocabulary.
///
/// # Errors
/// Returns [`ValidationError::Required`] for a blank goal and
/// [`ValidationError::UnknownGoal`] when it is not listed.
pub fn validate_goal<S: AsRef<str>>(goal: &str, vocabulary: &[S]) -> Result<(), ValidationError> {
    if goal.trim().is_empty() {
        return Err(ValidationError::Required("goal"));
    }
    if vocabulary.iter().any(|g| g.as_ref() == goal) {
        Ok(())
    } else {
        Err(ValidationError::UnknownGoal {
            goal: goal.to_string(),
            allowed: vocabulary
                .iter()
                .map(|g| g.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}
