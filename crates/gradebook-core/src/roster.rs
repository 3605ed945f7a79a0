//! The roster: student registry plus every class.
//!
//! This is the unit of persistence (one JSON snapshot) and the container the
//! reminder scheduler walks on every sweep.

use serde::{Deserialize, Serialize};

use crate::class::Class;
use crate::enrollment::Enrollment;
use crate::error::{NotFoundError, Result};
use crate::student::{Student, StudentSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub students: StudentSet,
    #[serde(default)]
    classes: Vec<Class>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Students ─────────────────────────────────────────────────────

    /// # Errors
    /// Returns [`ValidationError::DuplicateStudent`](crate::error::ValidationError::DuplicateStudent)
    /// if the CPF is taken.
    pub fn add_student(&mut self, student: Student) -> Result<&Student> {
        Ok(self.students.add(student)?)
    }

    /// Remove a student and every enrollment that references them.
    ///
    /// # Errors
    /// Returns [`NotFoundError::Student`] if the CPF is unknown.
    pub fn remove_student(&mut self, cpf: &str) -> Result<Student> {
        let student = self
            .students
            .remove(cpf)
            .ok_or_else(|| NotFoundError::Student(cpf.to_string()))?;
        for class in &mut self.classes {
            class.remove_enrollment(cpf);
        }
        Ok(student)
    }

    pub fn student(&self, cpf: &str) -> Option<&Student> {
        self.students.find(cpf)
    }

    // ── Classes ──────────────────────────────────────────────────────

    pub fn add_class(&mut self, class: Class) -> &Class {
        self.classes.push(class);
        &self.classes[self.classes.len() - 1]
    }

    /// # Errors
    /// Returns [`NotFoundError::Class`] if the id is unknown.
    pub fn remove_class(&mut self, class_id: &str) -> Result<Class> {
        let index = self
            .classes
            .iter()
            .position(|c| c.id == class_id)
            .ok_or_else(|| NotFoundError::Class(class_id.to_string()))?;
        Ok(self.classes.remove(index))
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    /// # Errors
    /// Returns [`NotFoundError::Class`] if the id is unknown.
    pub fn class(&self, class_id: &str) -> Result<&Class, NotFoundError> {
        self.classes
            .iter()
            .find(|c| c.id == class_id)
            .ok_or_else(|| NotFoundError::Class(class_id.to_string()))
    }

    /// # Errors
    /// Returns [`NotFoundError::Class`] if the id is unknown.
    pub fn class_mut(&mut self, class_id: &str) -> Result<&mut Class, NotFoundError> {
        self.classes
            .iter_mut()
            .find(|c| c.id == class_id)
            .ok_or_else(|| NotFoundError::Class(class_id.to_string()))
    }

    /// Enroll a registered student.
    ///
    /// # Errors
    /// Not-found for an unknown class or student, validation error if the
    /// student is already enrolled.
    pub fn enroll(&mut self, class_id: &str, cpf: &str) -> Result<&mut Enrollment> {
        if self.students.find(cpf).is_none() {
            return Err(NotFoundError::Student(cpf.to_string()).into());
        }
        let class = self.class_mut(class_id)?;
        Ok(class.add_enrollment(cpf)?)
    }

    /// # Errors
    /// Not-found for an unknown class or a student who is not enrolled.
    pub fn unenroll(&mut self, class_id: &str, cpf: &str) -> Result<Enrollment> {
        let class = self.class_mut(class_id)?;
        class.remove_enrollment(cpf).ok_or_else(|| {
            NotFoundError::Enrollment {
                class_id: class_id.to_string(),
                cpf: cpf.to_string(),
            }
            .into()
        })
    }

    /// # Errors
    /// Not-found for an unknown class or a student who is not enrolled.
    pub fn enrollment_mut(&mut self, class_id: &str, cpf: &str) -> Result<&mut Enrollment> {
        Ok(self.class_mut(class_id)?.enrollment_mut(cpf)?)
    }

    /// Every enrollment of every class, paired with its class id.
    ///
    /// Order is classes in insertion order, then enrollments in insertion
    /// order. Callers must not rely on it.
    pub fn enrollments_mut(&mut self) -> impl Iterator<Item = (&str, &mut Enrollment)> {
        self.classes.iter_mut().flat_map(|class| {
            let (id, enrollments) = class.split_enrollments_mut();
            enrollments.iter_mut().map(move |e| (id, e))
        })
    }

    pub fn enrollment_count(&self) -> usize {
        self.classes.iter().map(|c| c.enrollments().len()).sum()
    }
}
