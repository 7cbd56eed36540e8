use std::collections::HashMap;
use std::sync::Arc;

use course_core::model::{
    CourseId, Enrollment, LessonId, Progress, ProgressUpdate, StudentId, sort_lessons,
};
use course_core::unlock::lesson_access;
use course_core::{CourseCompletion, LessonAccess};
use storage::repository::{
    CourseRepository, EnrollmentRepository, LessonRepository, ProgressPersistence,
    ProgressRepository, StorageError,
};

use super::access::LessonContext;
use super::view::{CourseOutline, LessonOutlineItem, LessonView};
use crate::Clock;
use crate::error::{AccessDenied, ProgressServiceError};

/// Records lesson progress and keeps the enrollment roll-up in step with it.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    lessons: Arc<dyn LessonRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    progress: Arc<dyn ProgressRepository>,
    writes: Arc<dyn ProgressPersistence>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        lessons: Arc<dyn LessonRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        progress: Arc<dyn ProgressRepository>,
        writes: Arc<dyn ProgressPersistence>,
    ) -> Self {
        Self {
            clock,
            courses,
            lessons,
            enrollments,
            progress,
            writes,
        }
    }

    /// Apply a position report from the player or PDF viewer.
    ///
    /// A completed record is returned unchanged, even if reordering has since put the
    /// lesson behind an unfinished one. Positions only move forward, and
    /// reaching the end of the lesson completes it. The enrollment's percent and
    /// status are updated in the same write.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the lesson does not exist.
    /// Returns `ProgressServiceError::Forbidden` if the student is not enrolled or the
    /// lesson is still locked.
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    #[tracing::instrument(skip(self))]
    pub async fn update_progress(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
        update: ProgressUpdate,
    ) -> Result<Progress, ProgressServiceError> {
        let ctx = self.load(student_id, lesson_id).await?;
        if let Some(done) = ctx.current_progress().filter(|p| p.is_completed()) {
            tracing::debug!("lesson already completed, update ignored");
            return Ok(done.clone());
        }
        ctx.ensure_unlocked()?;

        let now = self.clock.now();
        let mut record = ctx
            .current_progress()
            .cloned()
            .unwrap_or_else(|| Progress::start(student_id, lesson_id, now));
        record.apply_update(&ctx.lesson, update, now)?;
        tracing::debug!(
            time = ?record.current_time_seconds(),
            page = ?record.current_page(),
            completed = record.is_completed(),
            "position recorded"
        );

        self.commit(ctx, record).await
    }

    /// Mark a lesson done. Calling it again leaves the record as it is.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ProgressService::update_progress`].
    #[tracing::instrument(skip(self))]
    pub async fn mark_lesson_complete(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<Progress, ProgressServiceError> {
        let ctx = self.load(student_id, lesson_id).await?;
        if let Some(done) = ctx.current_progress().filter(|p| p.is_completed()) {
            return Ok(done.clone());
        }
        ctx.ensure_unlocked()?;

        let now = self.clock.now();
        let mut record = ctx
            .current_progress()
            .cloned()
            .unwrap_or_else(|| Progress::start(student_id, lesson_id, now));
        record.mark_completed(now);

        self.commit(ctx, record).await
    }

    /// Gate for a lesson content page.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the lesson does not exist.
    /// Returns `ProgressServiceError::Forbidden` if the student may not see it yet.
    #[tracing::instrument(skip(self))]
    pub async fn open_lesson(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<LessonView, ProgressServiceError> {
        let ctx = self.load(student_id, lesson_id).await?;
        ctx.ensure_unlocked()?;

        let (previous, next) = ctx.neighbours();
        let progress = ctx.current_progress().cloned();
        Ok(LessonView {
            lesson: ctx.lesson,
            progress,
            previous,
            next,
        })
    }

    /// Ordered lessons with their lock state and the course roll-up.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the course does not exist.
    /// Returns `ProgressServiceError::Forbidden` if the student is not enrolled.
    pub async fn course_outline(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<CourseOutline, ProgressServiceError> {
        let enrollment = self.require_enrollment(student_id, course_id).await?;

        let mut lessons = self.lessons.list_lessons(course_id).await?;
        sort_lessons(&mut lessons);
        let records = self.progress.list_course_progress(student_id, course_id).await?;
        let completion = CourseCompletion::compute(&lessons, &records);

        let access: HashMap<LessonId, _> = lesson_access(&lessons, &records).into_iter().collect();
        let mut by_lesson: HashMap<LessonId, Progress> =
            records.into_iter().map(|p| (p.lesson_id(), p)).collect();

        let items = lessons
            .into_iter()
            .map(|lesson| {
                let progress = by_lesson.remove(&lesson.id());
                let weight = progress.as_ref().map_or(0.0, |p| p.weight(&lesson));
                LessonOutlineItem {
                    access: access
                        .get(&lesson.id())
                        .copied()
                        .unwrap_or(LessonAccess::Unlocked),
                    progress,
                    weight,
                    lesson,
                }
            })
            .collect();

        Ok(CourseOutline {
            course_id,
            status: enrollment.status(),
            weighted_percent: completion.weighted_percent(),
            completed_lessons: completion.completed_lessons(),
            total_lessons: completion.total_lessons(),
            lessons: items,
        })
    }

    /// Fresh completion snapshot for an enrolled student.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the course does not exist.
    /// Returns `ProgressServiceError::Forbidden` if the student is not enrolled.
    pub async fn course_completion(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<CourseCompletion, ProgressServiceError> {
        self.require_enrollment(student_id, course_id).await?;
        let lessons = self.lessons.list_lessons(course_id).await?;
        let records = self.progress.list_course_progress(student_id, course_id).await?;
        Ok(CourseCompletion::compute(&lessons, &records))
    }

    async fn load(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<LessonContext, ProgressServiceError> {
        LessonContext::load(
            self.lessons.as_ref(),
            self.enrollments.as_ref(),
            self.progress.as_ref(),
            student_id,
            lesson_id,
        )
        .await
    }

    async fn require_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Enrollment, ProgressServiceError> {
        if self.courses.get_course(course_id).await?.is_none() {
            return Err(ProgressServiceError::NotFound("course"));
        }
        self.enrollments
            .get_enrollment(student_id, course_id)
            .await?
            .ok_or(ProgressServiceError::Forbidden(AccessDenied::NotEnrolled { course_id }))
    }

    /// Write `record`; storage re-derives the enrollment from the committed rows.
    async fn commit(
        &self,
        ctx: LessonContext,
        record: Progress,
    ) -> Result<Progress, ProgressServiceError> {
        let student_id = record.student_id();
        let lesson_id = record.lesson_id();
        let course_id = ctx.enrollment.course_id();
        let previous = ctx.enrollment.status();

        let enrollment = match self.writes.save_progress(&record, course_id).await {
            Err(StorageError::NotFound) => {
                // Unenrolled, or the lesson moved away, between the read and the write.
                return Err(AccessDenied::NotEnrolled { course_id }.into());
            }
            other => other?,
        };

        if previous != enrollment.status() {
            tracing::info!(
                %student_id,
                course_id = %enrollment.course_id(),
                from = previous.as_str(),
                to = enrollment.status().as_str(),
                percent = enrollment.progress_percent(),
                "learning status changed"
            );
        }
        if record.is_completed() {
            tracing::info!(%student_id, %lesson_id, "lesson completed");
        }

        // The stored row may be ahead of ours if another request won a race.
        Ok(self
            .progress
            .get_progress(student_id, lesson_id)
            .await?
            .unwrap_or(record))
    }
}
