use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{LessonId, StudentId};
use crate::model::lesson::{Lesson, LessonContent};

/// Trailing tolerance for video end-of-stream events.
pub const VIDEO_COMPLETION_TOLERANCE_SECS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress for lesson {progress} cannot be updated with lesson {lesson}")]
    LessonMismatch {
        progress: LessonId,
        lesson: LessonId,
    },
}

/// A position report coming from the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub current_time_seconds: Option<u32>,
    pub current_page: Option<u32>,
    pub complete: bool,
}

impl ProgressUpdate {
    #[must_use]
    pub fn video_position(seconds: u32) -> Self {
        Self {
            current_time_seconds: Some(seconds),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn pdf_page(page: u32) -> Self {
        Self {
            current_page: Some(page),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn completed() -> Self {
        Self {
            complete: true,
            ..Self::default()
        }
    }
}

/// What an update did to a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// The record was already completed; nothing changed.
    AlreadyCompleted,
    /// Positions and timestamp were recorded; lesson still open.
    Recorded,
    /// This update completed the lesson.
    Completed,
}

impl ProgressOutcome {
    #[must_use]
    pub fn is_changed(self) -> bool {
        !matches!(self, ProgressOutcome::AlreadyCompleted)
    }
}

/// Consumption state of one lesson for one student.
///
/// Completion is terminal: once `is_completed` is set, no method changes the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    student_id: StudentId,
    lesson_id: LessonId,
    is_completed: bool,
    current_time_seconds: Option<u32>,
    current_page: Option<u32>,
    last_update: DateTime<Utc>,
}

impl Progress {
    /// Fresh, empty record for a first interaction.
    #[must_use]
    pub fn start(student_id: StudentId, lesson_id: LessonId, now: DateTime<Utc>) -> Self {
        Self {
            student_id,
            lesson_id,
            is_completed: false,
            current_time_seconds: None,
            current_page: None,
            last_update: now,
        }
    }

    #[must_use]
    pub fn from_persisted(
        student_id: StudentId,
        lesson_id: LessonId,
        is_completed: bool,
        current_time_seconds: Option<u32>,
        current_page: Option<u32>,
        last_update: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id,
            lesson_id,
            is_completed,
            current_time_seconds,
            current_page,
            last_update,
        }
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn current_time_seconds(&self) -> Option<u32> {
        self.current_time_seconds
    }

    #[must_use]
    pub fn current_page(&self) -> Option<u32> {
        self.current_page
    }

    #[must_use]
    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    /// Apply a client position report.
    ///
    /// - completed records are left untouched;
    /// - positions only move forward;
    /// - an explicit `complete` or reaching the end of the lesson completes it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::LessonMismatch` if `lesson` is not the lesson this record tracks.
    pub fn apply_update(
        &mut self,
        lesson: &Lesson,
        update: ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<ProgressOutcome, ProgressError> {
        self.ensure_lesson(lesson)?;
        if self.is_completed {
            return Ok(ProgressOutcome::AlreadyCompleted);
        }

        self.current_time_seconds = raise(self.current_time_seconds, update.current_time_seconds);
        self.current_page = raise(self.current_page, update.current_page);

        if update.complete || self.reached_end(lesson.content()) {
            self.is_completed = true;
        }
        self.last_update = now;

        Ok(if self.is_completed {
            ProgressOutcome::Completed
        } else {
            ProgressOutcome::Recorded
        })
    }

    /// Mark the lesson done without touching positions.
    #[must_use = "the outcome tells whether anything needs persisting"]
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> ProgressOutcome {
        if self.is_completed {
            return ProgressOutcome::AlreadyCompleted;
        }
        self.is_completed = true;
        self.last_update = now;
        ProgressOutcome::Completed
    }

    /// Fractional completion of this lesson in `[0, 100]`.
    #[must_use]
    pub fn weight(&self, lesson: &Lesson) -> f64 {
        if self.is_completed {
            return 100.0;
        }
        let Some(total) = lesson.total_extent() else {
            return 0.0;
        };
        let current = match lesson.content() {
            LessonContent::Video { .. } => self.current_time_seconds,
            LessonContent::Pdf { .. } => self.current_page,
        };
        current.map_or(0.0, |current| {
            (100.0 * f64::from(current) / f64::from(total)).clamp(0.0, 100.0)
        })
    }

    fn reached_end(&self, content: LessonContent) -> bool {
        let Some(total) = content.total_extent() else {
            return false;
        };
        match content {
            LessonContent::Video { .. } => self
                .current_time_seconds
                .is_some_and(|t| t >= total.saturating_sub(VIDEO_COMPLETION_TOLERANCE_SECS)),
            LessonContent::Pdf { .. } => self.current_page.is_some_and(|p| p >= total),
        }
    }

    fn ensure_lesson(&self, lesson: &Lesson) -> Result<(), ProgressError> {
        if lesson.id() == self.lesson_id {
            Ok(())
        } else {
            Err(ProgressError::LessonMismatch {
                progress: self.lesson_id,
                lesson: lesson.id(),
            })
        }
    }
}

fn raise(stored: Option<u32>, incoming: Option<u32>) -> Option<u32> {
    match (stored, incoming) {
        (Some(old), Some(new)) if new > old => Some(new),
        (None, Some(new)) => Some(new),
        _ => stored,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
