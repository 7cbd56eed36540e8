use serde::Serialize;

use course_core::LessonAccess;
use course_core::model::{CourseId, LearningStatus, Lesson, LessonId, Progress};

/// What a student sees when opening a lesson page.
#[derive(Debug, Clone, Serialize)]
pub struct LessonView {
    pub lesson: Lesson,
    pub progress: Option<Progress>,
    pub previous: Option<LessonId>,
    pub next: Option<LessonId>,
}

/// One line of the course outline.
#[derive(Debug, Clone, Serialize)]
pub struct LessonOutlineItem {
    pub lesson: Lesson,
    pub access: LessonAccess,
    pub progress: Option<Progress>,
    /// Fractional completion of this lesson in `[0, 100]`.
    pub weight: f64,
}

/// Course page for an enrolled student.
///
/// `weighted_percent` is the same measure stored on the enrollment.
#[derive(Debug, Clone, Serialize)]
pub struct CourseOutline {
    pub course_id: CourseId,
    pub status: LearningStatus,
    pub weighted_percent: f64,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub lessons: Vec<LessonOutlineItem>,
}

impl CourseOutline {
    /// First lesson the student can open but has not finished.
    #[must_use]
    pub fn resume_point(&self) -> Option<&LessonOutlineItem> {
        self.lessons.iter().find(|item| {
            item.access.is_unlocked() && !item.progress.as_ref().is_some_and(Progress::is_completed)
        })
    }
}
