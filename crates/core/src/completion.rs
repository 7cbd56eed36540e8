//! Course-level completion measures.
//!
//! Two measures coexist and each consumer uses exactly one:
//! - `weighted_percent` (mean of per-lesson fractional completion): stored on the
//!   enrollment and shown on the course outline;
//! - `count_percent` (completed lessons over total lessons): shown in the enrolled-course
//!   listing.
//!
//! The `Completed` learning status is decided by `is_fully_completed`, never by the
//! weighted measure.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Lesson, LessonId, Progress};

/// Snapshot of how far a student is through a course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CourseCompletion {
    total_lessons: usize,
    completed_lessons: usize,
    weighted_percent: f64,
}

impl CourseCompletion {
    /// Compute both measures for one student's progress over a course's lessons.
    ///
    /// Lessons without a progress record count as 0; progress for lessons outside
    /// `lessons` is ignored. An empty course is 0% complete.
    #[must_use]
    pub fn compute(lessons: &[Lesson], progress: &[Progress]) -> Self {
        let by_lesson: HashMap<LessonId, &Progress> =
            progress.iter().map(|p| (p.lesson_id(), p)).collect();

        let mut completed_lessons = 0_usize;
        let mut weight_sum = 0.0_f64;
        for lesson in lessons {
            let Some(p) = by_lesson.get(&lesson.id()) else {
                continue;
            };
            if p.is_completed() {
                completed_lessons += 1;
            }
            weight_sum += p.weight(lesson);
        }

        let total_lessons = lessons.len();
        let weighted_percent = if total_lessons == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let total = total_lessons as f64;
            (weight_sum / total).clamp(0.0, 100.0)
        };

        Self {
            total_lessons,
            completed_lessons,
            weighted_percent,
        }
    }

    /// Build a snapshot from already-aggregated values.
    #[must_use]
    pub fn from_counts(total_lessons: usize, completed_lessons: usize, weighted_percent: f64) -> Self {
        Self {
            total_lessons,
            completed_lessons: completed_lessons.min(total_lessons),
            weighted_percent: weighted_percent.clamp(0.0, 100.0),
        }
    }

    #[must_use]
    pub fn total_lessons(&self) -> usize {
        self.total_lessons
    }

    #[must_use]
    pub fn completed_lessons(&self) -> usize {
        self.completed_lessons
    }

    #[must_use]
    pub fn weighted_percent(&self) -> f64 {
        self.weighted_percent
    }

    /// `completed / total * 100`, or 0 for an empty course.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn count_percent(&self) -> f64 {
        if self.total_lessons == 0 {
            return 0.0;
        }
        self.completed_lessons as f64 / self.total_lessons as f64 * 100.0
    }

    #[must_use]
    pub fn is_fully_completed(&self) -> bool {
        self.total_lessons > 0 && self.completed_lessons == self.total_lessons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, LessonContent, StudentId};
    use crate::time::fixed_now;

    fn lesson(id: u64, content: LessonContent) -> Lesson {
        Lesson::new(
            LessonId::new(id),
            CourseId::new(1),
            format!("Lesson {id}"),
            content,
            u32::try_from(id).unwrap(),
            fixed_now(),
        )
        .unwrap()
    }

    fn progress(lesson: u64, completed: bool, time: Option<u32>, page: Option<u32>) -> Progress {
        Progress::from_persisted(
            StudentId::new(1),
            LessonId::new(lesson),
            completed,
            time,
            page,
            fixed_now(),
        )
    }

    #[test]
    fn empty_course_is_zero() {
        let c = CourseCompletion::compute(&[], &[]);
        assert!(c.weighted_percent().abs() < f64::EPSILON);
        assert!(c.count_percent().abs() < f64::EPSILON);
        assert!(!c.is_fully_completed());
    }

    #[test]
    fn weighted_mean_counts_missing_progress_as_zero() {
        let lessons = vec![
            lesson(1, LessonContent::video(Some(60))),
            lesson(2, LessonContent::pdf(Some(5))),
            lesson(3, LessonContent::video(Some(60))),
            lesson(4, LessonContent::video(Some(200))),
        ];
        let records = vec![
            progress(1, true, Some(60), None),
            progress(2, true, None, Some(5)),
            progress(4, false, Some(100), None),
        ];

        let c = CourseCompletion::compute(&lessons, &records);
        assert!((c.weighted_percent() - 37.5).abs() < 1e-9);
        assert_eq!(c.completed_lessons(), 2);
        assert_eq!(c.total_lessons(), 4);
        assert!((c.count_percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn wrong_field_for_kind_contributes_nothing() {
        let lessons = vec![lesson(1, LessonContent::pdf(Some(10)))];
        let records = vec![progress(1, false, Some(9), None)];
        let c = CourseCompletion::compute(&lessons, &records);
        assert!(c.weighted_percent().abs() < f64::EPSILON);
    }

    #[test]
    fn progress_for_foreign_lessons_is_ignored() {
        let lessons = vec![lesson(1, LessonContent::pdf(Some(10)))];
        let records = vec![progress(1, false, None, Some(5)), progress(99, true, None, None)];
        let c = CourseCompletion::compute(&lessons, &records);
        assert_eq!(c.completed_lessons(), 0);
        assert!((c.weighted_percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn fully_completed_requires_every_lesson() {
        let lessons = vec![
            lesson(1, LessonContent::video(Some(1_000))),
            lesson(2, LessonContent::video(Some(1_000))),
        ];
        let almost = vec![
            progress(1, true, None, None),
            progress(2, false, Some(990), None),
        ];
        let c = CourseCompletion::compute(&lessons, &almost);
        assert!(c.weighted_percent() >= 99.0);
        assert!(!c.is_fully_completed());

        let done = vec![progress(1, true, None, None), progress(2, true, None, None)];
        assert!(CourseCompletion::compute(&lessons, &done).is_fully_completed());
    }
}
