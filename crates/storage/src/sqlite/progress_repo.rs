use course_core::model::{CourseId, Enrollment, LessonId, Progress, StudentId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_progress_row};
use super::rollup::refresh_enrollments;
use crate::repository::{ProgressPersistence, ProgressRepository, RollupCause, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<Option<Progress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT student_id, lesson_id, is_completed, current_time_seconds, current_page, last_update
            FROM progress
            WHERE student_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(id_i64("student_id", student_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_progress_row).transpose()
    }

    async fn list_course_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Vec<Progress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT p.student_id, p.lesson_id, p.is_completed, p.current_time_seconds,
                   p.current_page, p.last_update
            FROM progress p
            JOIN lessons l ON l.id = p.lesson_id
            WHERE p.student_id = ?1 AND l.course_id = ?2
            ORDER BY p.lesson_id ASC
            ",
        )
        .bind(id_i64("student_id", student_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_progress_row).collect()
    }
}

#[async_trait::async_trait]
impl ProgressPersistence for SqliteRepository {
    async fn save_progress(
        &self,
        progress: &Progress,
        course_id: CourseId,
    ) -> Result<Enrollment, StorageError> {
        let student = id_i64("student_id", progress.student_id().value())?;
        let lesson = id_i64("lesson_id", progress.lesson_id().value())?;
        let course = id_i64("course_id", course_id.value())?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // A completed row is terminal and positions only grow, whatever the caller read.
        sqlx::query(
            r"
            INSERT INTO progress (
                student_id, lesson_id, is_completed, current_time_seconds, current_page, last_update
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(student_id, lesson_id) DO UPDATE SET
                is_completed = excluded.is_completed,
                current_time_seconds = CASE
                    WHEN progress.current_time_seconds IS NULL THEN excluded.current_time_seconds
                    WHEN excluded.current_time_seconds IS NULL THEN progress.current_time_seconds
                    ELSE MAX(progress.current_time_seconds, excluded.current_time_seconds)
                END,
                current_page = CASE
                    WHEN progress.current_page IS NULL THEN excluded.current_page
                    WHEN excluded.current_page IS NULL THEN progress.current_page
                    ELSE MAX(progress.current_page, excluded.current_page)
                END,
                last_update = excluded.last_update
            WHERE progress.is_completed = 0
            ",
        )
        .bind(student)
        .bind(lesson)
        .bind(progress.is_completed())
        .bind(progress.current_time_seconds().map(i64::from))
        .bind(progress.current_page().map(i64::from))
        .bind(progress.last_update())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let in_course = sqlx::query("SELECT 1 FROM lessons WHERE id = ?1 AND course_id = ?2")
            .bind(lesson)
            .bind(course)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if in_course.is_none() {
            return Err(StorageError::NotFound);
        }

        let enrollment = refresh_enrollments(&mut tx, course, Some(student), RollupCause::Progress)
            .await?
            .pop()
            .ok_or(StorageError::NotFound)?;

        tx.commit().await.map_err(db_err)?;
        Ok(enrollment)
    }
}
