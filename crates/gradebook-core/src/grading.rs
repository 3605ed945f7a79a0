//! Weighted-average grading.
//!
//! A [`GradingScheme`] maps each grade to a numeric value and each goal to a
//! weight. The average is `Σ(goal_weight × grade_value) / Σ(goal_weight)`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::evaluation::{Evaluation, Grade, DEFAULT_GOALS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScheme", into = "RawScheme")]
pub struct GradingScheme {
    grade_values: BTreeMap<Grade, f64>,
    goal_weights: BTreeMap<String, f64>,
    goal_weight_sum: f64,
}

#[derive(Serialize, Deserialize)]
struct RawScheme {
    grade_values: BTreeMap<Grade, f64>,
    goal_weights: BTreeMap<String, f64>,
}

impl GradingScheme {
    /// # Errors
    /// Returns [`ValidationError::ZeroWeightSum`] if the goal weights add up
    /// to zero, since the average would be undefined.
    pub fn new(
        grade_values: BTreeMap<Grade, f64>,
        goal_weights: BTreeMap<String, f64>,
    ) -> Result<Self, ValidationError> {
        let goal_weight_sum: f64 = goal_weights.values().sum();
        if goal_weight_sum == 0.0 {
            return Err(ValidationError::ZeroWeightSum);
        }
        Ok(Self {
            grade_values,
            goal_weights,
            goal_weight_sum,
        })
    }

    pub fn grade_value(&self, grade: Grade) -> f64 {
        self.grade_values.get(&grade).copied().unwrap_or(0.0)
    }

    pub fn goal_weight(&self, goal: &str) -> f64 {
        self.goal_weights.get(goal).copied().unwrap_or(0.0)
    }

    /// Weighted average of `evaluations`.
    ///
    /// Goals without a weight and grades without a value contribute zero.
    pub fn average(&self, evaluations: &[Evaluation]) -> f64 {
        let total: f64 = evaluations
            .iter()
            .map(|e| self.goal_weight(e.goal()) * self.grade_value(e.grade()))
            .sum();
        total / self.goal_weight_sum
    }
}

impl Default for GradingScheme {
    /// MA = 10, MPA = 7, MANA = 0, every default goal weighted 1.
    fn default() -> Self {
        let grade_values = BTreeMap::from([(Grade::Ma, 10.0), (Grade::Mpa, 7.0), (Grade::Mana, 0.0)]);
        let goal_weights = DEFAULT_GOALS.iter().map(|g| (g.to_string(), 1.0)).collect();
        Self {
            grade_values,
            goal_weights,
            goal_weight_sum: DEFAULT_GOALS.len() as f64,
        }
    }
}

impl TryFrom<RawScheme> for GradingScheme {
    type Error = ValidationError;

    fn try_from(raw: RawScheme) -> Result<Self, Self::Error> {
        Self::new(raw.grade_values, raw.goal_weights)
    }
}

impl From<GradingScheme> for RawScheme {
    fn from(scheme: GradingScheme) -> Self {
        Self {
            grade_values: scheme.grade_values,
            goal_weights: scheme.goal_weights,
        }
    }
}
