//! Student registry.

use serde::{Deserialize, Serialize};

use crate::error::{NotFoundError, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    /// Unique key. Treated as an opaque identifier.
    pub cpf: String,
    pub email: String,
}

impl Student {
    /// # Errors
    /// Returns [`ValidationError::Required`] if any field is blank.
    pub fn new(
        name: impl Into<String>,
        cpf: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let student = Self {
            name: name.into(),
            cpf: cpf.into(),
            email: email.into(),
        };
        if student.name.trim().is_empty() {
            return Err(ValidationError::Required("name"));
        }
        if student.cpf.trim().is_empty() {
            return Err(ValidationError::Required("cpf"));
        }
        if student.email.trim().is_empty() {
            return Err(ValidationError::Required("email"));
        }
        Ok(student)
    }
}

/// Insertion-ordered set of students, unique by CPF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentSet {
    students: Vec<Student>,
}

impl StudentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns [`ValidationError::DuplicateStudent`] if the CPF is taken.
    pub fn add(&mut self, student: Student) -> Result<&Student, ValidationError> {
        if self.find(&student.cpf).is_some() {
            return Err(ValidationError::DuplicateStudent(student.cpf));
        }
        self.students.push(student);
        Ok(&self.students[self.students.len() - 1])
    }

    /// Replace name and email of the student with the same CPF.
    pub fn update(&mut self, student: Student) -> Result<&Student, NotFoundError> {
        let existing = self
            .students
            .iter_mut()
            .find(|s| s.cpf == student.cpf)
            .ok_or_else(|| NotFoundError::Student(student.cpf.clone()))?;
        existing.name = student.name;
        existing.email = student.email;
        Ok(existing)
    }

    pub fn remove(&mut self, cpf: &str) -> Option<Student> {
        let index = self.students.iter().position(|s| s.cpf == cpf)?;
        Some(self.students.remove(index))
    }

    pub fn find(&self, cpf: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.cpf == cpf)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Student> {
        self.students.iter()
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(cpf: &str) -> Student {
        Student::new("Aluno", cpf, "aluno@example.com").unwrap()
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert_eq!(
            Student::new("", "1", "a@b.com"),
            Err(ValidationError::Required("name"))
        );
        assert_eq!(
            Student::new("A", "1", " "),
            Err(ValidationError::Required("email"))
        );
    }

    #[test]
    fn duplicate_cpf_is_rejected() {
        let mut set = StudentSet::new();
        set.add(student("111")).unwrap();
        assert!(matches!(
            set.add(student("111")),
            Err(ValidationError::DuplicateStudent(_))
        ));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn update_keeps_cpf_and_replaces_contact() {
        let mut set = StudentSet::new();
        set.add(student("111")).unwrap();
        let updated = Student::new("Novo Nome", "111", "novo@example.com").unwrap();
        set.update(updated).unwrap();
        assert_eq!(set.find("111").unwrap().email, "novo@example.com");
        assert!(set.update(student("222")).is_err());
    }
}
