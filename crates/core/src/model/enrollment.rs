use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::completion::CourseCompletion;
use crate::model::ids::{CourseId, StudentId};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("progress percent must be within [0, 100], got {0}")]
    InvalidProgressPercent(f64),

    #[error("invalid learning status: {0}")]
    InvalidStatus(String),
}

/// Coarse, forward-only learning state of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LearningStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl LearningStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LearningStatus::NotStarted => "NOT_STARTED",
            LearningStatus::InProgress => "IN_PROGRESS",
            LearningStatus::Completed => "COMPLETED",
        }
    }

    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidStatus` for unknown values.
    pub fn parse(s: &str) -> Result<Self, EnrollmentError> {
        match s {
            "NOT_STARTED" => Ok(LearningStatus::NotStarted),
            "IN_PROGRESS" => Ok(LearningStatus::InProgress),
            "COMPLETED" => Ok(LearningStatus::Completed),
            other => Err(EnrollmentError::InvalidStatus(other.to_owned())),
        }
    }
}

/// A student's membership in a course, with denormalized progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enrollment {
    student_id: StudentId,
    course_id: CourseId,
    progress_percent: f64,
    status: LearningStatus,
    enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    #[must_use]
    pub fn new(student_id: StudentId, course_id: CourseId, enrolled_at: DateTime<Utc>) -> Self {
        Self {
            student_id,
            course_id,
            progress_percent: 0.0,
            status: LearningStatus::NotStarted,
            enrolled_at,
        }
    }

    /// Rehydrate an enrollment from storage.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::InvalidProgressPercent` if the percent is not finite or out of range.
    pub fn from_persisted(
        student_id: StudentId,
        course_id: CourseId,
        progress_percent: f64,
        status: LearningStatus,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Self, EnrollmentError> {
        if !progress_percent.is_finite() || !(0.0..=100.0).contains(&progress_percent) {
            return Err(EnrollmentError::InvalidProgressPercent(progress_percent));
        }
        Ok(Self {
            student_id,
            course_id,
            progress_percent,
            status,
            enrolled_at,
        })
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    /// Weighted completion percentage.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        self.progress_percent
    }

    #[must_use]
    pub fn status(&self) -> LearningStatus {
        self.status
    }

    #[must_use]
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    /// Fold a fresh completion snapshot into the enrollment after a progress update.
    ///
    /// The percent always tracks the weighted measure. Status moves to `InProgress` on
    /// the first update and to `Completed` only when every lesson is individually done.
    /// Status never moves backwards. Returns the previous status.
    pub fn record_completion(&mut self, completion: &CourseCompletion) -> LearningStatus {
        let previous = self.status;
        self.progress_percent = completion.weighted_percent();

        if self.status == LearningStatus::NotStarted {
            self.status = LearningStatus::InProgress;
        }
        if completion.is_fully_completed() {
            self.status = LearningStatus::Completed;
        }
        previous
    }

    /// Re-derive the enrollment after the course's lesson set changed.
    ///
    /// Unlike [`Enrollment::record_completion`] this is not a learning event, so a
    /// not-started enrollment stays not started unless the change leaves every lesson done.
    pub fn refresh_completion(&mut self, completion: &CourseCompletion) -> LearningStatus {
        let previous = self.status;
        self.progress_percent = completion.weighted_percent();
        if completion.is_fully_completed() {
            self.status = LearningStatus::Completed;
        }
        previous
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
