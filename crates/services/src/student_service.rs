use std::sync::Arc;

use course_core::model::{Student, StudentId};
use storage::repository::StudentRepository;

use crate::Clock;
use crate::error::StudentServiceError;

/// Mirrors identities handed over by the session layer into the course store.
#[derive(Clone)]
pub struct StudentService {
    clock: Clock,
    students: Arc<dyn StudentRepository>,
}

impl StudentService {
    #[must_use]
    pub fn new(clock: Clock, students: Arc<dyn StudentRepository>) -> Self {
        Self { clock, students }
    }

    /// Create the student, or rename an existing one keeping its registration time.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError::Student` for an empty name.
    /// Returns `StudentServiceError::Storage` if persistence fails.
    pub async fn register_student(
        &self,
        id: StudentId,
        name: &str,
    ) -> Result<Student, StudentServiceError> {
        let created_at = match self.students.get_student(id).await? {
            Some(existing) => existing.created_at(),
            None => self.clock.now(),
        };
        let student = Student::new(id, name, created_at)?;
        self.students.upsert_student(&student).await?;
        Ok(student)
    }

    /// # Errors
    ///
    /// Returns `StudentServiceError::Storage` if repository access fails.
    pub async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StudentServiceError> {
        Ok(self.students.get_student(id).await?)
    }
}
