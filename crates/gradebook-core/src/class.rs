//! Classes and their enrollments.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enrollment::Enrollment;
use crate::error::{NotFoundError, ValidationError};
use crate::grading::GradingScheme;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    pub topic: String,
    pub semester: u8,
    pub year: u16,
    #[serde(default)]
    pub grading: GradingScheme,
    #[serde(default)]
    enrollments: Vec<Enrollment>,
}

impl Class {
    /// Create an empty class with a fresh id.
    ///
    /// # Errors
    /// Returns [`ValidationError`] for a blank topic or a semester other than 1 or 2.
    pub fn new(
        topic: impl Into<String>,
        semester: u8,
        year: u16,
        grading: GradingScheme,
    ) -> Result<Self, ValidationError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(ValidationError::Required("topic"));
        }
        if !(1..=2).contains(&semester) {
            return Err(ValidationError::InvalidValue {
                field: "semester".into(),
                message: format!("expected 1 or 2, got {semester}"),
            });
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            topic,
            semester,
            year,
            grading,
            enrollments: Vec::new(),
        })
    }

    pub fn enrollments(&self) -> &[Enrollment] {
        &self.enrollments
    }

    pub fn enrollments_mut(&mut self) -> impl Iterator<Item = &mut Enrollment> {
        self.enrollments.iter_mut()
    }

    /// Id and enrollments borrowed together, for the roster-wide walk.
    pub(crate) fn split_enrollments_mut(&mut self) -> (&str, &mut Vec<Enrollment>) {
        (self.id.as_str(), &mut self.enrollments)
    }

    pub fn is_enrolled(&self, cpf: &str) -> bool {
        self.enrollment(cpf).is_some()
    }

    pub fn enrollment(&self, cpf: &str) -> Option<&Enrollment> {
        self.enrollments.iter().find(|e| e.student_cpf() == cpf)
    }

    /// # Errors
    /// Returns [`NotFoundError::Enrollment`] if the student is not in this class.
    pub fn enrollment_mut(&mut self, cpf: &str) -> Result<&mut Enrollment, NotFoundError> {
        let class_id = self.id.clone();
        self.enrollments
            .iter_mut()
            .find(|e| e.student_cpf() == cpf)
            .ok_or_else(|| NotFoundError::Enrollment {
                class_id,
                cpf: cpf.to_string(),
            })
    }

    /// # Errors
    /// Returns [`ValidationError::AlreadyEnrolled`] on a second enrollment.
    pub fn add_enrollment(&mut self, cpf: &str) -> Result<&mut Enrollment, ValidationError> {
        if self.is_enrolled(cpf) {
            return Err(ValidationError::AlreadyEnrolled {
                class_id: self.id.clone(),
                cpf: cpf.to_string(),
            });
        }
        self.enrollments.push(Enrollment::new(cpf));
        let last = self.enrollments.len() - 1;
        Ok(&mut self.enrollments[last])
    }

    pub fn remove_enrollment(&mut self, cpf: &str) -> Option<Enrollment> {
        let index = self.enrollments.iter().position(|e| e.student_cpf() == cpf)?;
        Some(self.enrollments.remove(index))
    }

    /// Fill every enrollment's pre-final average from its evaluations.
    pub fn recompute_averages(&mut self) {
        for enrollment in &mut self.enrollments {
            let media = self.grading.average(enrollment.evaluations());
            enrollment.set_media_pre_final(media);
        }
    }
}
