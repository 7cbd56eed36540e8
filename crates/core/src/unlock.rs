//! Sequential lesson unlocking.
//!
//! A lesson is locked iff the lesson immediately before it (in course order) is not
//! completed. The first lesson is always open. This is a derived view and is
//! recomputed on every access.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::{Lesson, LessonId, Progress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LessonAccess {
    Unlocked,
    Locked { blocked_by: LessonId },
}

impl LessonAccess {
    #[must_use]
    pub fn is_unlocked(self) -> bool {
        matches!(self, LessonAccess::Unlocked)
    }
}

/// Access state for every lesson, in the order given.
///
/// `ordered_lessons` must already be in course order (see `sort_lessons`).
#[must_use]
pub fn lesson_access(ordered_lessons: &[Lesson], progress: &[Progress]) -> Vec<(LessonId, LessonAccess)> {
    let completed: HashSet<LessonId> = progress
        .iter()
        .filter(|p| p.is_completed())
        .map(Progress::lesson_id)
        .collect();

    let mut out = Vec::with_capacity(ordered_lessons.len());
    let mut previous: Option<LessonId> = None;
    for lesson in ordered_lessons {
        let access = match previous {
            Some(prev) if !completed.contains(&prev) => LessonAccess::Locked { blocked_by: prev },
            _ => LessonAccess::Unlocked,
        };
        out.push((lesson.id(), access));
        previous = Some(lesson.id());
    }
    out
}

/// Access state for a single lesson, or `None` if it is not part of `ordered_lessons`.
#[must_use]
pub fn access_for(
    ordered_lessons: &[Lesson],
    progress: &[Progress],
    lesson_id: LessonId,
) -> Option<LessonAccess> {
    let index = ordered_lessons.iter().position(|l| l.id() == lesson_id)?;
    let Some(prev) = index.checked_sub(1).map(|i| ordered_lessons[i].id()) else {
        return Some(LessonAccess::Unlocked);
    };
    let done = progress
        .iter()
        .any(|p| p.lesson_id() == prev && p.is_completed());
    Some(if done {
        LessonAccess::Unlocked
    } else {
        LessonAccess::Locked { blocked_by: prev }
    })
}
