use course_core::model::{Enrollment, Lesson, LessonId, Progress, StudentId, sort_lessons};
use course_core::unlock::access_for;
use course_core::LessonAccess;
use storage::repository::{EnrollmentRepository, LessonRepository, ProgressRepository};

use crate::error::{AccessDenied, ProgressServiceError};

/// Everything needed to decide on and apply a change to one lesson's progress.
pub(crate) struct LessonContext {
    pub lesson: Lesson,
    pub enrollment: Enrollment,
    /// All lessons of the course in course order.
    pub lessons: Vec<Lesson>,
    /// The student's progress records across the course.
    pub progress: Vec<Progress>,
}

impl LessonContext {
    /// Load a lesson for a student, requiring an enrollment in its course.
    pub async fn load(
        lessons: &dyn LessonRepository,
        enrollments: &dyn EnrollmentRepository,
        progress: &dyn ProgressRepository,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<Self, ProgressServiceError> {
        let lesson = lessons
            .get_lesson(lesson_id)
            .await?
            .ok_or(ProgressServiceError::NotFound("lesson"))?;
        let course_id = lesson.course_id();

        let Some(enrollment) = enrollments.get_enrollment(student_id, course_id).await? else {
            tracing::warn!(%student_id, %course_id, "lesson requested without enrollment");
            return Err(AccessDenied::NotEnrolled { course_id }.into());
        };

        let mut ordered = lessons.list_lessons(course_id).await?;
        sort_lessons(&mut ordered);
        let progress = progress.list_course_progress(student_id, course_id).await?;

        Ok(Self {
            lesson,
            enrollment,
            lessons: ordered,
            progress,
        })
    }

    pub fn access(&self) -> LessonAccess {
        // The lesson was just read from this course, so it is always in the list.
        access_for(&self.lessons, &self.progress, self.lesson.id()).unwrap_or(LessonAccess::Unlocked)
    }

    pub fn ensure_unlocked(&self) -> Result<(), AccessDenied> {
        match self.access() {
            LessonAccess::Unlocked => Ok(()),
            LessonAccess::Locked { blocked_by } => {
                tracing::warn!(
                    student_id = %self.enrollment.student_id(),
                    lesson_id = %self.lesson.id(),
                    %blocked_by,
                    "locked lesson requested"
                );
                Err(AccessDenied::LessonLocked {
                    lesson_id: self.lesson.id(),
                    blocked_by,
                })
            }
        }
    }

    pub fn current_progress(&self) -> Option<&Progress> {
        self.progress
            .iter()
            .find(|p| p.lesson_id() == self.lesson.id())
    }

    /// Neighbouring lessons in course order.
    pub fn neighbours(&self) -> (Option<LessonId>, Option<LessonId>) {
        let Some(index) = self.lessons.iter().position(|l| l.id() == self.lesson.id()) else {
            return (None, None);
        };
        let previous = index.checked_sub(1).map(|i| self.lessons[i].id());
        let next = self.lessons.get(index + 1).map(Lesson::id);
        (previous, next)
    }
}
