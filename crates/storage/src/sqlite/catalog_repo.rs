use course_core::model::{
    Category, CategoryId, Course, CourseId, Lesson, LessonId, Student, StudentId,
};

use super::SqliteRepository;
use super::mapping::{
    LESSON_COLUMNS, category_id_from_i64, course_id_from_i64, db_err, id_i64,
    lesson_content_columns, lesson_id_from_i64, map_category_row, map_course_row, map_lesson_row,
    map_student_row,
};
use super::rollup::refresh_enrollments;
use crate::repository::{
    CategoryRepository, CourseRepository, LessonRepository, NewCategoryRecord, NewCourseRecord,
    NewLessonRecord, RollupCause, StorageError, StudentRepository,
};

#[async_trait::async_trait]
impl StudentRepository for SqliteRepository {
    async fn upsert_student(&self, student: &Student) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO students (id, name, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            ",
        )
        .bind(id_i64("student_id", student.id().value())?)
        .bind(student.name())
        .bind(student.created_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StorageError> {
        let row = sqlx::query("SELECT id, name, created_at FROM students WHERE id = ?1")
            .bind(id_i64("student_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_student_row).transpose()
    }
}

#[async_trait::async_trait]
impl CategoryRepository for SqliteRepository {
    async fn insert_new_category(
        &self,
        category: NewCategoryRecord,
    ) -> Result<CategoryId, StorageError> {
        let res = sqlx::query("INSERT INTO categories (name) VALUES (?1)")
            .bind(category.name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        category_id_from_i64(res.last_insert_rowid())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name ASC, id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(map_category_row).collect()
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id_i64("category_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn insert_new_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError> {
        let category = course
            .category_id
            .map(|c| id_i64("category_id", c.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
            INSERT INTO courses (title, description, category_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(course.title)
        .bind(course.description)
        .bind(category)
        .bind(course.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        course_id_from_i64(res.last_insert_rowid())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(
            "SELECT id, title, description, category_id, created_at FROM courses WHERE id = ?1",
        )
        .bind(id_i64("course_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_course_row).transpose()
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, category_id, created_at
            FROM courses
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_course_row).collect()
    }

    async fn delete_course(&self, id: CourseId) -> Result<(), StorageError> {
        // lessons, enrollments and progress go with it via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM courses WHERE id = ?1")
            .bind(id_i64("course_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn insert_new_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError> {
        let (kind, duration, pages) = lesson_content_columns(lesson.content);
        let course = id_i64("course_id", lesson.course_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            INSERT INTO lessons (
                course_id, title, kind, total_duration_seconds, total_pages, position, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(course)
        .bind(lesson.title)
        .bind(kind)
        .bind(duration)
        .bind(pages)
        .bind(i64::from(lesson.position))
        .bind(lesson.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let id = lesson_id_from_i64(res.last_insert_rowid())?;

        refresh_enrollments(&mut tx, course, None, RollupCause::Catalog).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(id)
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let (kind, duration, pages) = lesson_content_columns(lesson.content());
        let course = id_i64("course_id", lesson.course_id().value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query(
            r"
            UPDATE lessons
            SET title = ?3, kind = ?4, total_duration_seconds = ?5, total_pages = ?6, position = ?7
            WHERE id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("lesson_id", lesson.id().value())?)
        .bind(course)
        .bind(lesson.title())
        .bind(kind)
        .bind(duration)
        .bind(pages)
        .bind(i64::from(lesson.position()))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        refresh_enrollments(&mut tx, course, None, RollupCause::Catalog).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("lesson_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError> {
        let sql = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = ?1 ORDER BY position ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("course_id", course_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(map_lesson_row).collect()
    }

    async fn update_positions(
        &self,
        course_id: CourseId,
        positions: &[(LessonId, u32)],
    ) -> Result<(), StorageError> {
        let course = id_i64("course_id", course_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for (lesson_id, position) in positions {
            let res = sqlx::query("UPDATE lessons SET position = ?1 WHERE id = ?2 AND course_id = ?3")
                .bind(i64::from(*position))
                .bind(id_i64("lesson_id", lesson_id.value())?)
                .bind(course)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            if res.rows_affected() == 0 {
                // dropping the transaction rolls back earlier updates
                return Err(StorageError::NotFound);
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn delete_lesson(&self, id: LessonId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // progress rows on the lesson go with it via ON DELETE CASCADE
        let course: i64 = sqlx::query_scalar("DELETE FROM lessons WHERE id = ?1 RETURNING course_id")
            .bind(id_i64("lesson_id", id.value())?)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or(StorageError::NotFound)?;

        refresh_enrollments(&mut tx, course, None, RollupCause::Catalog).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
