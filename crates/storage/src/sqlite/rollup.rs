use course_core::CourseCompletion;
use course_core::model::{Enrollment, Progress};
use sqlx::{Row, SqliteConnection};

use super::mapping::{
    LESSON_COLUMNS, db_err, map_enrollment_row, map_lesson_row, map_progress_row,
};
use crate::repository::{RollupCause, StorageError};

/// Recompute and store the enrollments of `course`, or only `student`'s when given.
///
/// Callers run this inside the transaction that changed the rows, after its first write,
/// so the lessons and progress read here are the ones being committed.
pub(super) async fn refresh_enrollments(
    conn: &mut SqliteConnection,
    course: i64,
    student: Option<i64>,
    cause: RollupCause,
) -> Result<Vec<Enrollment>, StorageError> {
    let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = ?1");
    let lessons = sqlx::query(&sql)
        .bind(course)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?
        .iter()
        .map(map_lesson_row)
        .collect::<Result<Vec<_>, _>>()?;

    let rows = sqlx::query(
        r"
        SELECT student_id, course_id, progress_percent, status, enrolled_at
        FROM enrollments
        WHERE course_id = ?1 AND (?2 IS NULL OR student_id = ?2)
        ORDER BY student_id ASC
        ",
    )
    .bind(course)
    .bind(student)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?;

    let mut refreshed = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut enrollment = map_enrollment_row(row)?;
        let student_id: i64 = row.try_get("student_id").map_err(db_err)?;

        let progress = sqlx::query(
            r"
            SELECT p.student_id, p.lesson_id, p.is_completed, p.current_time_seconds,
                   p.current_page, p.last_update
            FROM progress p
            JOIN lessons l ON l.id = p.lesson_id
            WHERE p.student_id = ?1 AND l.course_id = ?2
            ",
        )
        .bind(student_id)
        .bind(course)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?
        .iter()
        .map(map_progress_row)
        .collect::<Result<Vec<Progress>, _>>()?;

        cause.apply(&mut enrollment, &CourseCompletion::compute(&lessons, &progress));

        sqlx::query(
            r"
            UPDATE enrollments
            SET progress_percent = ?3, status = ?4
            WHERE student_id = ?1 AND course_id = ?2
            ",
        )
        .bind(student_id)
        .bind(course)
        .bind(enrollment.progress_percent())
        .bind(enrollment.status().as_str())
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;

        refreshed.push(enrollment);
    }
    Ok(refreshed)
}
