use course_core::model::{
    Category, CategoryId, Course, CourseId, Enrollment, LearningStatus, Lesson, LessonContent,
    LessonId, LessonKind, Progress, Student, StudentId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) const LESSON_COLUMNS: &str =
    "id, course_id, title, kind, total_duration_seconds, total_pages, position, created_at";

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Translate driver errors, surfacing constraint violations as domain-level storage errors.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn opt_u32(row: &SqliteRow, field: &'static str) -> Result<Option<u32>, StorageError> {
    row.try_get::<Option<i64>, _>(field)
        .map_err(ser)?
        .map(|v| u32_from_i64(field, v))
        .transpose()
}

pub(crate) fn student_id_from_i64(v: i64) -> Result<StudentId, StorageError> {
    Ok(StudentId::new(i64_to_u64("student_id", v)?))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn category_id_from_i64(v: i64) -> Result<CategoryId, StorageError> {
    Ok(CategoryId::new(i64_to_u64("category_id", v)?))
}

pub(crate) fn map_student_row(row: &SqliteRow) -> Result<Student, StorageError> {
    Student::new(
        student_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_category_row(row: &SqliteRow) -> Result<Category, StorageError> {
    Category::new(
        category_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Course::new(
        course_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        row.try_get::<Option<i64>, _>("category_id")
            .map_err(ser)?
            .map(category_id_from_i64)
            .transpose()?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

/// Splits lesson content into the `(kind, total_duration_seconds, total_pages)` columns.
pub(crate) fn lesson_content_columns(content: LessonContent) -> (&'static str, Option<i64>, Option<i64>) {
    (
        content.kind().as_str(),
        content.total_duration_seconds().map(i64::from),
        content.total_pages().map(i64::from),
    )
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let kind_str: String = row.try_get("kind").map_err(ser)?;
    let content = match LessonKind::parse(&kind_str).map_err(ser)? {
        LessonKind::Video => LessonContent::video(opt_u32(row, "total_duration_seconds")?),
        LessonKind::Pdf => LessonContent::pdf(opt_u32(row, "total_pages")?),
    };

    Lesson::new(
        lesson_id_from_i64(row.try_get("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        content,
        u32_from_i64("position", row.try_get("position").map_err(ser)?)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Enrollment::from_persisted(
        student_id_from_i64(row.try_get("student_id").map_err(ser)?)?,
        course_id_from_i64(row.try_get("course_id").map_err(ser)?)?,
        row.try_get("progress_percent").map_err(ser)?,
        LearningStatus::parse(&status).map_err(ser)?,
        row.try_get("enrolled_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<Progress, StorageError> {
    Ok(Progress::from_persisted(
        student_id_from_i64(row.try_get("student_id").map_err(ser)?)?,
        lesson_id_from_i64(row.try_get("lesson_id").map_err(ser)?)?,
        row.try_get("is_completed").map_err(ser)?,
        opt_u32(row, "current_time_seconds")?,
        opt_u32(row, "current_page")?,
        row.try_get("last_update").map_err(ser)?,
    ))
}
