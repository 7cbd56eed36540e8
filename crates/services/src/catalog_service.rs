use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use course_core::model::{
    CourseId, Lesson, LessonContent, LessonId, next_position, sort_lessons,
};
use storage::repository::{CourseRepository, LessonRepository, NewLessonRecord, StorageError};

use crate::Clock;
use crate::error::CatalogError;

/// Ordered lesson catalog per course.
#[derive(Clone)]
pub struct LessonCatalogService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    lessons: Arc<dyn LessonRepository>,
}

impl LessonCatalogService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        lessons: Arc<dyn LessonRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            lessons,
        }
    }

    /// Append a lesson at the end of the course.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the course does not exist.
    /// Returns `CatalogError::Lesson` for validation failures.
    /// Returns `CatalogError::Storage` if persistence fails.
    #[tracing::instrument(skip(self, title, content))]
    pub async fn add_lesson(
        &self,
        course_id: CourseId,
        title: &str,
        content: LessonContent,
    ) -> Result<Lesson, CatalogError> {
        self.ensure_course(course_id).await?;
        let position = self.next_order_position(course_id).await?;
        let draft = Lesson::new(
            LessonId::new(0),
            course_id,
            title,
            content,
            position,
            self.clock.now(),
        )?;

        let id = match self
            .lessons
            .insert_new_lesson(NewLessonRecord::from_lesson(&draft))
            .await
        {
            Err(StorageError::NotFound) => return Err(CatalogError::NotFound("course")),
            other => other?,
        };
        tracing::info!(lesson_id = %id, position, "lesson added");

        Ok(Lesson::new(
            id,
            course_id,
            draft.title(),
            draft.content(),
            position,
            draft.created_at(),
        )?)
    }

    /// Lessons of a course in course order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, CatalogError> {
        let mut lessons = self.lessons.list_lessons(course_id).await?;
        sort_lessons(&mut lessons);
        Ok(lessons)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, CatalogError> {
        Ok(self.lessons.get_lesson(id).await?)
    }

    /// Change title and content. Position and course stay as they are.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the lesson does not exist.
    /// Returns `CatalogError::Lesson` for validation failures.
    pub async fn update_lesson(
        &self,
        id: LessonId,
        title: &str,
        content: LessonContent,
    ) -> Result<Lesson, CatalogError> {
        let current = self
            .lessons
            .get_lesson(id)
            .await?
            .ok_or(CatalogError::NotFound("lesson"))?;
        let revised = current.revised(title, content)?;
        match self.lessons.update_lesson(&revised).await {
            Err(StorageError::NotFound) => Err(CatalogError::NotFound("lesson")),
            other => {
                other?;
                Ok(revised)
            }
        }
    }

    /// Position a new lesson would receive: one past the current maximum, or 1.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn next_order_position(&self, course_id: CourseId) -> Result<u32, CatalogError> {
        let lessons = self.lessons.list_lessons(course_id).await?;
        Ok(next_position(&lessons))
    }

    /// Assign positions `1..=n` following `order`.
    ///
    /// Lessons of the course that `order` leaves out keep their current position.
    /// Returns the full lesson list in its new order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateLesson` if an id is listed twice.
    /// Returns `CatalogError::NotFound` if the course is missing or an id belongs to
    /// another course; no position changes in that case.
    #[tracing::instrument(skip(self, order), fields(count = order.len()))]
    pub async fn reorder(
        &self,
        course_id: CourseId,
        order: &[LessonId],
    ) -> Result<Vec<Lesson>, CatalogError> {
        let mut seen = HashSet::with_capacity(order.len());
        if let Some(dup) = order.iter().find(|id| !seen.insert(**id)) {
            return Err(CatalogError::DuplicateLesson(*dup));
        }
        self.ensure_course(course_id).await?;

        let mut lessons = self.lessons.list_lessons(course_id).await?;
        let known: HashSet<LessonId> = lessons.iter().map(Lesson::id).collect();
        if let Some(stranger) = order.iter().find(|id| !known.contains(id)) {
            tracing::warn!(lesson_id = %stranger, "reorder names a lesson outside the course");
            return Err(CatalogError::NotFound("lesson"));
        }

        let positions: Vec<(LessonId, u32)> = order.iter().copied().zip(1_u32..).collect();
        match self.lessons.update_positions(course_id, &positions).await {
            Err(StorageError::NotFound) => return Err(CatalogError::NotFound("lesson")),
            other => other?,
        }

        let assigned: HashMap<LessonId, u32> = positions.into_iter().collect();
        for lesson in &mut lessons {
            if let Some(position) = assigned.get(&lesson.id()) {
                lesson.set_position(*position);
            }
        }
        sort_lessons(&mut lessons);
        tracing::info!("lessons reordered");
        Ok(lessons)
    }

    /// Delete a lesson along with every student's progress on it.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the lesson does not exist.
    pub async fn delete_lesson(&self, id: LessonId) -> Result<(), CatalogError> {
        match self.lessons.delete_lesson(id).await {
            Err(StorageError::NotFound) => Err(CatalogError::NotFound("lesson")),
            other => Ok(other?),
        }
    }

    async fn ensure_course(&self, course_id: CourseId) -> Result<(), CatalogError> {
        self.courses
            .get_course(course_id)
            .await?
            .map(|_| ())
            .ok_or(CatalogError::NotFound("course"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::model::Course;
    use course_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, NewCourseRecord};

    async fn catalog() -> (LessonCatalogService, CourseId) {
        let repo = InMemoryRepository::new();
        let draft = Course::new(CourseId::new(0), "Rust", None, None, fixed_now()).unwrap();
        let course_id = repo
            .insert_new_course(NewCourseRecord::from_course(&draft))
            .await
            .unwrap();
        let service =
            LessonCatalogService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo));
        (service, course_id)
    }

    fn ids(lessons: &[Lesson]) -> Vec<LessonId> {
        lessons.iter().map(Lesson::id).collect()
    }

    #[tokio::test]
    async fn lessons_are_appended_in_order() {
        let (catalog, course) = catalog().await;
        assert_eq!(catalog.next_order_position(course).await.unwrap(), 1);

        let a = catalog
            .add_lesson(course, "Intro", LessonContent::video(Some(300)))
            .await
            .unwrap();
        let b = catalog
            .add_lesson(course, "Slides", LessonContent::pdf(Some(12)))
            .await
            .unwrap();

        assert_eq!((a.position(), b.position()), (1, 2));
        assert_eq!(catalog.next_order_position(course).await.unwrap(), 3);
        assert_eq!(ids(&catalog.list_lessons(course).await.unwrap()), vec![a.id(), b.id()]);
    }

    #[tokio::test]
    async fn reorder_assigns_consecutive_positions() {
        let (catalog, course) = catalog().await;
        let mut added = Vec::new();
        for title in ["A", "B", "C"] {
            added.push(
                catalog
                    .add_lesson(course, title, LessonContent::pdf(None))
                    .await
                    .unwrap()
                    .id(),
            );
        }

        let order = vec![added[2], added[0], added[1]];
        let lessons = catalog.reorder(course, &order).await.unwrap();
        assert_eq!(ids(&lessons), order);
        assert_eq!(
            lessons.iter().map(Lesson::position).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(ids(&catalog.list_lessons(course).await.unwrap()), order);
    }

    #[tokio::test]
    async fn reorder_rejects_duplicates_and_strangers() {
        let (catalog, course) = catalog().await;
        let a = catalog
            .add_lesson(course, "A", LessonContent::pdf(None))
            .await
            .unwrap();
        let b = catalog
            .add_lesson(course, "B", LessonContent::pdf(None))
            .await
            .unwrap();

        let err = catalog.reorder(course, &[a.id(), a.id()]).await.unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateLesson(id) if id == a.id()));

        let err = catalog
            .reorder(course, &[b.id(), LessonId::new(999)])
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound("lesson")));
        assert_eq!(ids(&catalog.list_lessons(course).await.unwrap()), vec![a.id(), b.id()]);
    }

    #[tokio::test]
    async fn update_keeps_position() {
        let (catalog, course) = catalog().await;
        catalog
            .add_lesson(course, "First", LessonContent::pdf(None))
            .await
            .unwrap();
        let second = catalog
            .add_lesson(course, "Second", LessonContent::video(None))
            .await
            .unwrap();

        let updated = catalog
            .update_lesson(second.id(), "Second, extended", LessonContent::video(Some(90)))
            .await
            .unwrap();
        assert_eq!(updated.position(), 2);
        assert_eq!(updated.total_extent(), Some(90));
    }

    #[tokio::test]
    async fn add_to_missing_course_is_not_found() {
        let (catalog, _) = catalog().await;
        let err = catalog
            .add_lesson(CourseId::new(404), "Lost", LessonContent::pdf(None))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound("course")));
    }
}
