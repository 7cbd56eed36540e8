use std::sync::Arc;

use storage::repository::Storage;

use crate::catalog_service::LessonCatalogService;
use crate::course_service::CourseService;
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;
use crate::progress::ProgressService;
use crate::student_service::StudentService;
use crate::Clock;

/// Assembles every service over one shared `Storage`.
#[derive(Clone)]
pub struct AppServices {
    courses: Arc<CourseService>,
    students: Arc<StudentService>,
    catalog: Arc<LessonCatalogService>,
    enrollments: Arc<EnrollmentService>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let courses = Arc::new(CourseService::new(
            clock,
            Arc::clone(&storage.categories),
            Arc::clone(&storage.courses),
        ));
        let students = Arc::new(StudentService::new(clock, Arc::clone(&storage.students)));
        let catalog = Arc::new(LessonCatalogService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.lessons),
        ));
        let enrollments = Arc::new(EnrollmentService::new(
            clock,
            Arc::clone(&storage.students),
            Arc::clone(&storage.courses),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.progress),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.progress_writes),
        ));

        Self {
            courses,
            students,
            catalog,
            enrollments,
            progress,
        }
    }

    #[must_use]
    pub fn courses(&self) -> Arc<CourseService> {
        Arc::clone(&self.courses)
    }

    #[must_use]
    pub fn students(&self) -> Arc<StudentService> {
        Arc::clone(&self.students)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<LessonCatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn enrollments(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollments)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
