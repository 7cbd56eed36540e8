use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::StudentId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StudentError {
    #[error("student name cannot be empty")]
    EmptyName,
}

/// A learner known to the course system.
///
/// Authentication lives elsewhere; this record only anchors enrollments and progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    id: StudentId,
    name: String,
    created_at: DateTime<Utc>,
}

impl Student {
    /// # Errors
    ///
    /// Returns `StudentError::EmptyName` if name is empty or whitespace-only.
    pub fn new(
        id: StudentId,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, StudentError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StudentError::EmptyName);
        }
        Ok(Self {
            id,
            name: name.trim().to_owned(),
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> StudentId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
