use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("invalid lesson kind: {0}")]
    InvalidKind(String),
}

//
// ─── KIND & CONTENT ────────────────────────────────────────────────────────────
//

/// Type tag of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LessonKind {
    Video,
    Pdf,
}

impl LessonKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonKind::Video => "video",
            LessonKind::Pdf => "pdf",
        }
    }

    /// Parses the storage representation.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::InvalidKind` for unknown tags.
    pub fn parse(s: &str) -> Result<Self, LessonError> {
        match s {
            "video" => Ok(LessonKind::Video),
            "pdf" => Ok(LessonKind::Pdf),
            other => Err(LessonError::InvalidKind(other.to_owned())),
        }
    }
}

/// What a lesson consists of, together with its measurable total extent.
///
/// The extent is optional: an instructor may publish a lesson before its
/// duration or page count is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LessonContent {
    Video { total_duration_seconds: Option<u32> },
    Pdf { total_pages: Option<u32> },
}

impl LessonContent {
    #[must_use]
    pub fn video(total_duration_seconds: Option<u32>) -> Self {
        Self::Video {
            total_duration_seconds,
        }
    }

    #[must_use]
    pub fn pdf(total_pages: Option<u32>) -> Self {
        Self::Pdf { total_pages }
    }

    #[must_use]
    pub fn kind(&self) -> LessonKind {
        match self {
            Self::Video { .. } => LessonKind::Video,
            Self::Pdf { .. } => LessonKind::Pdf,
        }
    }

    #[must_use]
    pub fn total_duration_seconds(&self) -> Option<u32> {
        match self {
            Self::Video {
                total_duration_seconds,
            } => *total_duration_seconds,
            Self::Pdf { .. } => None,
        }
    }

    #[must_use]
    pub fn total_pages(&self) -> Option<u32> {
        match self {
            Self::Pdf { total_pages } => *total_pages,
            Self::Video { .. } => None,
        }
    }

    /// Configured extent (seconds or pages), only when positive.
    #[must_use]
    pub fn total_extent(&self) -> Option<u32> {
        let raw = match self {
            Self::Video {
                total_duration_seconds,
            } => *total_duration_seconds,
            Self::Pdf { total_pages } => *total_pages,
        };
        raw.filter(|v| *v > 0)
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lesson {
    id: LessonId,
    course_id: CourseId,
    title: String,
    content: LessonContent,
    position: u32,
    created_at: DateTime<Utc>,
}

impl Lesson {
    /// Creates a new Lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` if title is empty or whitespace-only.
    pub fn new(
        id: LessonId,
        course_id: CourseId,
        title: impl Into<String>,
        content: LessonContent,
        position: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LessonError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }

        Ok(Self {
            id,
            course_id,
            title: title.trim().to_owned(),
            content,
            position,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> LessonContent {
        self.content
    }

    #[must_use]
    pub fn kind(&self) -> LessonKind {
        self.content.kind()
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn total_extent(&self) -> Option<u32> {
        self.content.total_extent()
    }

    pub fn set_position(&mut self, position: u32) {
        self.position = position;
    }

    /// Returns a copy with a new title and content, keeping identity and order.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` if title is empty or whitespace-only.
    pub fn revised(
        &self,
        title: impl Into<String>,
        content: LessonContent,
    ) -> Result<Self, LessonError> {
        Self::new(
            self.id,
            self.course_id,
            title,
            content,
            self.position,
            self.created_at,
        )
    }
}

/// Sorts lessons into course order: ascending position, ties broken by ascending id.
pub fn sort_lessons(lessons: &mut [Lesson]) {
    lessons.sort_by_key(|l| (l.position(), l.id()));
}

/// Next free position for a course: `max + 1`, or `1` when the course is empty.
#[must_use]
pub fn next_position(lessons: &[Lesson]) -> u32 {
    lessons
        .iter()
        .map(Lesson::position)
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
