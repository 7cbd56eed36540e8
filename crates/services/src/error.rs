//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{
    CategoryError, CourseError, CourseId, LessonError, LessonId, ProgressError, StudentError,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Policy rejection for content access. Messages are shown to the student.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("you are not enrolled in course {course_id}")]
    NotEnrolled { course_id: CourseId },

    #[error("finish lesson {blocked_by} before starting lesson {lesson_id}")]
    LessonLocked {
        lesson_id: LessonId,
        blocked_by: LessonId,
    },
}

/// Errors emitted by `CourseService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StudentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudentServiceError {
    #[error(transparent)]
    Student(#[from] StudentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LessonCatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("lesson {0} appears more than once in the new order")]
    DuplicateLesson(LessonId),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `EnrollmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Forbidden(#[from] AccessDenied),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressServiceError {
    /// The access-denied reason, when this is a policy rejection.
    #[must_use]
    pub fn access_denied(&self) -> Option<AccessDenied> {
        match self {
            Self::Forbidden(denied) => Some(*denied),
            _ => None,
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
