use std::sync::Arc;

use course_core::model::{Category, CategoryId, Course, CourseId};
use storage::repository::{
    CategoryRepository, CourseRepository, NewCategoryRecord, NewCourseRecord, StorageError,
};

use crate::Clock;
use crate::error::CourseServiceError;

/// Course and category bookkeeping used by instructors and admins.
#[derive(Clone)]
pub struct CourseService {
    clock: Clock,
    categories: Arc<dyn CategoryRepository>,
    courses: Arc<dyn CourseRepository>,
}

impl CourseService {
    #[must_use]
    pub fn new(
        clock: Clock,
        categories: Arc<dyn CategoryRepository>,
        courses: Arc<dyn CourseRepository>,
    ) -> Self {
        Self {
            clock,
            categories,
            courses,
        }
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::Category` for an empty name.
    /// Returns `CourseServiceError::Storage` if persistence fails.
    pub async fn create_category(&self, name: &str) -> Result<Category, CourseServiceError> {
        let draft = Category::new(CategoryId::new(0), name)?;
        let id = self
            .categories
            .insert_new_category(NewCategoryRecord::from_category(&draft))
            .await?;
        Ok(Category::new(id, draft.name())?)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, CourseServiceError> {
        Ok(self.categories.list_categories().await?)
    }

    /// Delete a category. Courses in it become uncategorised.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` if the category does not exist.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), CourseServiceError> {
        match self.categories.delete_category(id).await {
            Err(StorageError::NotFound) => Err(CourseServiceError::NotFound("category")),
            other => Ok(other?),
        }
    }

    /// Create a course and persist it.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Course` for validation failures.
    /// Returns `CourseServiceError::NotFound` if the category does not exist.
    /// Returns `CourseServiceError::Storage` if persistence fails.
    #[tracing::instrument(skip(self, description))]
    pub async fn create_course(
        &self,
        title: &str,
        description: Option<String>,
        category_id: Option<CategoryId>,
    ) -> Result<Course, CourseServiceError> {
        let draft = Course::new(
            CourseId::new(0),
            title,
            description,
            category_id,
            self.clock.now(),
        )?;
        let id = match self
            .courses
            .insert_new_course(NewCourseRecord::from_course(&draft))
            .await
        {
            Err(StorageError::NotFound) => return Err(CourseServiceError::NotFound("category")),
            other => other?,
        };
        tracing::info!(course_id = %id, "course created");

        Ok(Course::new(
            id,
            draft.title(),
            draft.description().map(str::to_owned),
            draft.category_id(),
            draft.created_at(),
        )?)
    }

    /// Returns `Ok(None)` when the course does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn get_course(&self, id: CourseId) -> Result<Option<Course>, CourseServiceError> {
        Ok(self.courses.get_course(id).await?)
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self.courses.list_courses(limit).await?)
    }

    /// Delete a course with its lessons, enrollments and progress.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` if the course does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn delete_course(&self, id: CourseId) -> Result<(), CourseServiceError> {
        match self.courses.delete_course(id).await {
            Err(StorageError::NotFound) => Err(CourseServiceError::NotFound("course")),
            other => {
                other?;
                tracing::info!("course deleted");
                Ok(())
            }
        }
    }
}
