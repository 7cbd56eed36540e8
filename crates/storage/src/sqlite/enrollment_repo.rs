use course_core::model::{CourseId, Enrollment, StudentId};

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_enrollment_row};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO enrollments (student_id, course_id, progress_percent, status, enrolled_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("student_id", enrollment.student_id().value())?)
        .bind(id_i64("course_id", enrollment.course_id().value())?)
        .bind(enrollment.progress_percent())
        .bind(enrollment.status().as_str())
        .bind(enrollment.enrolled_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT student_id, course_id, progress_percent, status, enrolled_at
            FROM enrollments
            WHERE student_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("student_id", student_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn list_enrollments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT student_id, course_id, progress_percent, status, enrolled_at
            FROM enrollments
            WHERE student_id = ?1
            ORDER BY enrolled_at ASC, course_id ASC
            ",
        )
        .bind(id_i64("student_id", student_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(map_enrollment_row).collect()
    }

    async fn delete_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<(), StorageError> {
        let student = id_i64("student_id", student_id.value())?;
        let course = id_i64("course_id", course_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let res = sqlx::query("DELETE FROM enrollments WHERE student_id = ?1 AND course_id = ?2")
            .bind(student)
            .bind(course)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
            DELETE FROM progress
            WHERE student_id = ?1
              AND lesson_id IN (SELECT id FROM lessons WHERE course_id = ?2)
            ",
        )
        .bind(student)
        .bind(course)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
