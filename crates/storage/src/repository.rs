use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::CourseCompletion;
use course_core::model::{
    Category, CategoryId, Course, CourseId, Enrollment, Lesson, LessonContent, LessonId, Progress,
    Student, StudentId, sort_lessons,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── INSERT RECORDS ────────────────────────────────────────────────────────────
//

/// Insert shape for a category; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewCategoryRecord {
    pub name: String,
}

impl NewCategoryRecord {
    #[must_use]
    pub fn from_category(category: &Category) -> Self {
        Self {
            name: category.name().to_owned(),
        }
    }
}

/// Insert shape for a course; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewCourseRecord {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
}

impl NewCourseRecord {
    #[must_use]
    pub fn from_course(course: &Course) -> Self {
        Self {
            title: course.title().to_owned(),
            description: course.description().map(str::to_owned),
            category_id: course.category_id(),
            created_at: course.created_at(),
        }
    }
}

/// Insert shape for a lesson; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewLessonRecord {
    pub course_id: CourseId,
    pub title: String,
    pub content: LessonContent,
    pub position: u32,
    pub created_at: DateTime<Utc>,
}

impl NewLessonRecord {
    #[must_use]
    pub fn from_lesson(lesson: &Lesson) -> Self {
        Self {
            course_id: lesson.course_id(),
            title: lesson.title().to_owned(),
            content: lesson.content(),
            position: lesson.position(),
            created_at: lesson.created_at(),
        }
    }
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Persist or update a student.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the student cannot be stored.
    async fn upsert_student(&self, student: &Student) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StorageError>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the category cannot be stored.
    async fn insert_new_category(
        &self,
        category: NewCategoryRecord,
    ) -> Result<CategoryId, StorageError>;

    /// All categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError>;

    /// Delete a category; courses keep existing without a category.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the category does not exist.
    async fn delete_category(&self, id: CategoryId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the referenced category does not exist,
    /// or other storage errors.
    async fn insert_new_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// Courses ordered by id, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError>;

    /// Delete a course with its lessons, enrollments and progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn delete_course(&self, id: CourseId) -> Result<(), StorageError>;
}

/// Ordered lesson catalog per course.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Insert a lesson and re-derive every enrollment of its course in the same write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist, or other storage errors.
    async fn insert_new_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError>;

    /// Overwrite title, content and position of an existing lesson.
    ///
    /// Content changes alter lesson weights, so the course's enrollments are re-derived too.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    async fn update_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Lessons of a course ascending by position, ties by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError>;

    /// Assign positions in one atomic step.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any lesson is not part of `course_id`;
    /// nothing is written in that case.
    async fn update_positions(
        &self,
        course_id: CourseId,
        positions: &[(LessonId, u32)],
    ) -> Result<(), StorageError>;

    /// Delete a lesson and every progress record on it, then re-derive the course's
    /// enrollments. Removing the last open lesson completes them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist.
    async fn delete_lesson(&self, id: LessonId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the (student, course) pair already exists,
    /// `StorageError::NotFound` if the student or course is missing.
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// Enrollments of a student ordered by enrollment time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_enrollments(&self, student_id: StudentId)
    -> Result<Vec<Enrollment>, StorageError>;

    /// Remove the enrollment and the student's progress on the course's lessons.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the enrollment does not exist.
    async fn delete_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_progress(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<Option<Progress>, StorageError>;

    /// The student's progress records on lessons of one course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_course_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<Progress>, StorageError>;
}

/// Atomic write of a progress record together with the enrollment it rolls up into.
#[async_trait]
pub trait ProgressPersistence: Send + Sync {
    /// Upsert `progress`, then recompute the student's enrollment in `course_id` from the
    /// stored lessons and progress rows, in one transaction. Returns the stored enrollment.
    ///
    /// A stored record that is already completed is left untouched, and stored
    /// positions are never lowered, even if `progress` was computed from a stale read.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson is not part of `course_id` or the
    /// student is not enrolled in it.
    async fn save_progress(
        &self,
        progress: &Progress,
        course_id: CourseId,
    ) -> Result<Enrollment, StorageError>;
}

/// What made an enrollment roll-up stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RollupCause {
    /// The student reported progress.
    Progress,
    /// Lessons were added, edited or removed.
    Catalog,
}

impl RollupCause {
    pub(crate) fn apply(self, enrollment: &mut Enrollment, completion: &CourseCompletion) {
        match self {
            RollupCause::Progress => enrollment.record_completion(completion),
            RollupCause::Catalog => enrollment.refresh_completion(completion),
        };
    }
}

/// Combine a stored record with a freshly computed one without regressing it.
#[must_use]
pub fn merge_progress(stored: &Progress, incoming: &Progress) -> Progress {
    if stored.is_completed() {
        return stored.clone();
    }
    Progress::from_persisted(
        stored.student_id(),
        stored.lesson_id(),
        incoming.is_completed(),
        stored
            .current_time_seconds()
            .max(incoming.current_time_seconds()),
        stored.current_page().max(incoming.current_page()),
        incoming.last_update(),
    )
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    students: HashMap<StudentId, Student>,
    categories: BTreeMap<CategoryId, Category>,
    courses: BTreeMap<CourseId, Course>,
    lessons: BTreeMap<LessonId, Lesson>,
    enrollments: BTreeMap<(StudentId, CourseId), Enrollment>,
    progress: HashMap<(StudentId, LessonId), Progress>,
    next_id: u64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn drop_lesson_progress(&mut self, lesson_id: LessonId) {
        self.progress.retain(|(_, lid), _| *lid != lesson_id);
    }

    /// Recompute the enrollments of `course_id`, or only `student`'s when given.
    fn refresh_enrollments(
        &mut self,
        course_id: CourseId,
        student: Option<StudentId>,
        cause: RollupCause,
    ) -> Vec<Enrollment> {
        let lessons: Vec<Lesson> = self
            .lessons
            .values()
            .filter(|l| l.course_id() == course_id)
            .cloned()
            .collect();
        let lesson_ids: HashSet<LessonId> = lessons.iter().map(Lesson::id).collect();

        let mut refreshed = Vec::new();
        for ((sid, cid), enrollment) in &mut self.enrollments {
            if *cid != course_id || student.is_some_and(|s| s != *sid) {
                continue;
            }
            let progress: Vec<Progress> = self
                .progress
                .values()
                .filter(|p| p.student_id() == *sid && lesson_ids.contains(&p.lesson_id()))
                .cloned()
                .collect();
            cause.apply(enrollment, &CourseCompletion::compute(&lessons, &progress));
            refreshed.push(enrollment.clone());
        }
        refreshed
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Mirrors the cascade rules of the SQL schema.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl StudentRepository for InMemoryRepository {
    async fn upsert_student(&self, student: &Student) -> Result<(), StorageError> {
        self.lock()?.students.insert(student.id(), student.clone());
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StorageError> {
        Ok(self.lock()?.students.get(&id).cloned())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryRepository {
    async fn insert_new_category(
        &self,
        category: NewCategoryRecord,
    ) -> Result<CategoryId, StorageError> {
        let mut guard = self.lock()?;
        let id = CategoryId::new(guard.allocate_id());
        let category = Category::new(id, category.name)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.categories.insert(id, category);
        Ok(id)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let mut out: Vec<Category> = self.lock()?.categories.values().cloned().collect();
        out.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        Ok(out)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.categories.remove(&id).ok_or(StorageError::NotFound)?;
        let orphaned: Vec<Course> = guard
            .courses
            .values()
            .filter(|c| c.category_id() == Some(id))
            .cloned()
            .collect();
        for course in orphaned {
            let detached = Course::new(
                course.id(),
                course.title(),
                course.description().map(str::to_owned),
                None,
                course.created_at(),
            )
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
            guard.courses.insert(course.id(), detached);
        }
        Ok(())
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn insert_new_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError> {
        let mut guard = self.lock()?;
        if let Some(category) = course.category_id {
            if !guard.categories.contains_key(&category) {
                return Err(StorageError::NotFound);
            }
        }
        let id = CourseId::new(guard.allocate_id());
        let course = Course::new(
            id,
            course.title,
            course.description,
            course.category_id,
            course.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.courses.insert(id, course);
        Ok(id)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self
            .lock()?
            .courses
            .values()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_course(&self, id: CourseId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.courses.remove(&id).ok_or(StorageError::NotFound)?;
        let lesson_ids: Vec<LessonId> = guard
            .lessons
            .values()
            .filter(|l| l.course_id() == id)
            .map(Lesson::id)
            .collect();
        for lesson_id in lesson_ids {
            guard.lessons.remove(&lesson_id);
            guard.drop_lesson_progress(lesson_id);
        }
        guard.enrollments.retain(|(_, cid), _| *cid != id);
        Ok(())
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn insert_new_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&lesson.course_id) {
            return Err(StorageError::NotFound);
        }
        let id = LessonId::new(guard.allocate_id());
        let lesson = Lesson::new(
            id,
            lesson.course_id,
            lesson.title,
            lesson.content,
            lesson.position,
            lesson.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let course_id = lesson.course_id();
        guard.lessons.insert(id, lesson);
        guard.refresh_enrollments(course_id, None, RollupCause::Catalog);
        Ok(id)
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard
            .lessons
            .get_mut(&lesson.id())
            .ok_or(StorageError::NotFound)?;
        if slot.course_id() != lesson.course_id() {
            return Err(StorageError::Conflict);
        }
        *slot = lesson.clone();
        guard.refresh_enrollments(lesson.course_id(), None, RollupCause::Catalog);
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let mut lessons: Vec<Lesson> = self
            .lock()?
            .lessons
            .values()
            .filter(|l| l.course_id() == course_id)
            .cloned()
            .collect();
        sort_lessons(&mut lessons);
        Ok(lessons)
    }

    async fn update_positions(
        &self,
        course_id: CourseId,
        positions: &[(LessonId, u32)],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let all_in_course = positions.iter().all(|(id, _)| {
            guard
                .lessons
                .get(id)
                .is_some_and(|l| l.course_id() == course_id)
        });
        if !all_in_course {
            return Err(StorageError::NotFound);
        }
        for (id, position) in positions {
            if let Some(lesson) = guard.lessons.get_mut(id) {
                lesson.set_position(*position);
            }
        }
        Ok(())
    }

    async fn delete_lesson(&self, id: LessonId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let removed = guard.lessons.remove(&id).ok_or(StorageError::NotFound)?;
        guard.drop_lesson_progress(id);
        guard.refresh_enrollments(removed.course_id(), None, RollupCause::Catalog);
        Ok(())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.students.contains_key(&enrollment.student_id())
            || !guard.courses.contains_key(&enrollment.course_id())
        {
            return Err(StorageError::NotFound);
        }
        let key = (enrollment.student_id(), enrollment.course_id());
        if guard.enrollments.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.enrollments.insert(key, enrollment.clone());
        Ok(())
    }

    async fn get_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        Ok(self
            .lock()?
            .enrollments
            .get(&(student_id, course_id))
            .cloned())
    }

    async fn list_enrollments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let mut out: Vec<Enrollment> = self
            .lock()?
            .enrollments
            .values()
            .filter(|e| e.student_id() == student_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| (e.enrolled_at(), e.course_id()));
        Ok(out)
    }

    async fn delete_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard
            .enrollments
            .remove(&(student_id, course_id))
            .ok_or(StorageError::NotFound)?;
        let course_lessons: Vec<LessonId> = guard
            .lessons
            .values()
            .filter(|l| l.course_id() == course_id)
            .map(Lesson::id)
            .collect();
        guard
            .progress
            .retain(|(sid, lid), _| *sid != student_id || !course_lessons.contains(lid));
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<Option<Progress>, StorageError> {
        Ok(self.lock()?.progress.get(&(student_id, lesson_id)).cloned())
    }

    async fn list_course_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<Progress>, StorageError> {
        let guard = self.lock()?;
        let mut out: Vec<Progress> = guard
            .progress
            .values()
            .filter(|p| {
                p.student_id() == student_id
                    && guard
                        .lessons
                        .get(&p.lesson_id())
                        .is_some_and(|l| l.course_id() == course_id)
            })
            .cloned()
            .collect();
        out.sort_by_key(Progress::lesson_id);
        Ok(out)
    }
}

#[async_trait]
impl ProgressPersistence for InMemoryRepository {
    async fn save_progress(
        &self,
        progress: &Progress,
        course_id: CourseId,
    ) -> Result<Enrollment, StorageError> {
        let mut guard = self.lock()?;
        let in_course = guard
            .lessons
            .get(&progress.lesson_id())
            .is_some_and(|l| l.course_id() == course_id);
        if !in_course
            || !guard
                .enrollments
                .contains_key(&(progress.student_id(), course_id))
        {
            return Err(StorageError::NotFound);
        }

        let progress_key = (progress.student_id(), progress.lesson_id());
        let merged = match guard.progress.get(&progress_key) {
            Some(stored) => merge_progress(stored, progress),
            None => progress.clone(),
        };
        guard.progress.insert(progress_key, merged);

        guard
            .refresh_enrollments(course_id, Some(progress.student_id()), RollupCause::Progress)
            .pop()
            .ok_or(StorageError::NotFound)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub students: Arc<dyn StudentRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub progress_writes: Arc<dyn ProgressPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(InMemoryRepository::new())
    }

    /// Use one backend value for every repository role.
    #[must_use]
    pub fn from_backend<R>(repo: R) -> Self
    where
        R: StudentRepository
            + CategoryRepository
            + CourseRepository
            + LessonRepository
            + EnrollmentRepository
            + ProgressRepository
            + ProgressPersistence
            + Clone
            + 'static,
    {
        Self {
            students: Arc::new(repo.clone()),
            categories: Arc::new(repo.clone()),
            courses: Arc::new(repo.clone()),
            lessons: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            progress_writes: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::LearningStatus;
    use course_core::time::fixed_now;

    async fn seeded() -> (InMemoryRepository, CourseId, Vec<LessonId>) {
        let repo = InMemoryRepository::new();
        let student = Student::new(StudentId::new(1), "Ada", fixed_now()).unwrap();
        repo.upsert_student(&student).await.unwrap();
        let course_id = repo
            .insert_new_course(NewCourseRecord {
                title: "Course".into(),
                description: None,
                category_id: None,
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        let mut lessons = Vec::new();
        for position in 1..=3 {
            let id = repo
                .insert_new_lesson(NewLessonRecord {
                    course_id,
                    title: format!("L{position}"),
                    content: LessonContent::pdf(Some(10)),
                    position,
                    created_at: fixed_now(),
                })
                .await
                .unwrap();
            lessons.push(id);
        }
        (repo, course_id, lessons)
    }

    #[tokio::test]
    async fn duplicate_enrollment_conflicts() {
        let (repo, course_id, _) = seeded().await;
        let enrollment = Enrollment::new(StudentId::new(1), course_id, fixed_now());
        repo.insert_enrollment(&enrollment).await.unwrap();
        let err = repo.insert_enrollment(&enrollment).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn save_progress_derives_percent_from_stored_rows() {
        let (repo, course_id, lessons) = seeded().await;
        let student = StudentId::new(1);
        repo.insert_enrollment(&Enrollment::new(student, course_id, fixed_now()))
            .await
            .unwrap();

        let ahead = Progress::from_persisted(student, lessons[0], false, None, Some(8), fixed_now());
        let enrollment = repo.save_progress(&ahead, course_id).await.unwrap();
        assert_eq!(enrollment.status(), LearningStatus::InProgress);
        assert!((enrollment.progress_percent() - 80.0 / 3.0).abs() < 1e-9);

        // A stale writer on page 3 keeps both the row and the roll-up at page 8.
        let stale = Progress::from_persisted(student, lessons[0], false, None, Some(3), fixed_now());
        repo.save_progress(&stale, course_id).await.unwrap();
        let stored = repo.get_progress(student, lessons[0]).await.unwrap().unwrap();
        assert_eq!(stored.current_page(), Some(8));
        let stored_enrollment = repo.get_enrollment(student, course_id).await.unwrap().unwrap();
        assert!((stored_enrollment.progress_percent() - 80.0 / 3.0).abs() < 1e-9);

        for lesson in &lessons {
            let done = Progress::from_persisted(student, *lesson, true, None, Some(10), fixed_now());
            repo.save_progress(&done, course_id).await.unwrap();
        }
        let late = Progress::from_persisted(student, lessons[2], false, None, Some(3), fixed_now());
        let enrollment = repo.save_progress(&late, course_id).await.unwrap();
        assert_eq!(enrollment.status(), LearningStatus::Completed);
        assert!((enrollment.progress_percent() - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn save_progress_rejects_lesson_of_another_course() {
        let (repo, course_id, lessons) = seeded().await;
        let student = StudentId::new(1);
        repo.insert_enrollment(&Enrollment::new(student, course_id, fixed_now()))
            .await
            .unwrap();
        let p = Progress::from_persisted(student, lessons[0], false, None, Some(2), fixed_now());
        let err = repo
            .save_progress(&p, CourseId::new(999))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn lesson_changes_re_derive_enrollments() {
        let (repo, course_id, lessons) = seeded().await;
        let student = StudentId::new(1);
        repo.insert_enrollment(&Enrollment::new(student, course_id, fixed_now()))
            .await
            .unwrap();
        for lesson in &lessons[..2] {
            let done = Progress::from_persisted(student, *lesson, true, None, Some(10), fixed_now());
            repo.save_progress(&done, course_id).await.unwrap();
        }

        repo.delete_lesson(lessons[2]).await.unwrap();
        let enrollment = repo.get_enrollment(student, course_id).await.unwrap().unwrap();
        assert_eq!(enrollment.status(), LearningStatus::Completed);
        assert!((enrollment.progress_percent() - 100.0).abs() < 1e-9);

        repo.insert_new_lesson(NewLessonRecord {
            course_id,
            title: "Appendix".into(),
            content: LessonContent::pdf(Some(4)),
            position: 3,
            created_at: fixed_now(),
        })
        .await
        .unwrap();
        let enrollment = repo.get_enrollment(student, course_id).await.unwrap().unwrap();
        assert_eq!(enrollment.status(), LearningStatus::Completed);
        assert!((enrollment.progress_percent() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unenroll_cascades_course_progress_only() {
        let (repo, course_id, lessons) = seeded().await;
        let student = StudentId::new(1);
        let enrollment = Enrollment::new(student, course_id, fixed_now());
        repo.insert_enrollment(&enrollment).await.unwrap();
        let done = Progress::from_persisted(student, lessons[0], true, None, Some(10), fixed_now());
        repo.save_progress(&done, course_id).await.unwrap();

        repo.delete_enrollment(student, course_id).await.unwrap();
        assert!(repo.get_progress(student, lessons[0]).await.unwrap().is_none());
        assert!(matches!(
            repo.delete_enrollment(student, course_id).await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn update_positions_is_all_or_nothing() {
        let (repo, course_id, lessons) = seeded().await;
        let err = repo
            .update_positions(course_id, &[(lessons[2], 1), (LessonId::new(999), 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
        let listed = repo.list_lessons(course_id).await.unwrap();
        assert_eq!(listed[0].id(), lessons[0]);
    }
}
