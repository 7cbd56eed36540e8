use std::sync::Arc;

use serde::Serialize;

use course_core::CourseCompletion;
use course_core::model::{Course, CourseId, Enrollment, StudentId};
use storage::repository::{
    CourseRepository, EnrollmentRepository, LessonRepository, ProgressRepository, StorageError,
    StudentRepository,
};

use crate::Clock;
use crate::error::EnrollmentServiceError;

/// One row of a student's "my courses" listing.
#[derive(Debug, Clone, Serialize)]
pub struct EnrolledCourse {
    pub course: Course,
    pub enrollment: Enrollment,
    pub completion: CourseCompletion,
}

impl EnrolledCourse {
    /// Share of lessons completed. The listing shows this count-based measure,
    /// while the outline shows the weighted one stored on the enrollment.
    #[must_use]
    pub fn listing_percent(&self) -> f64 {
        self.completion.count_percent()
    }
}

/// Enrollment lifecycle for students.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    students: Arc<dyn StudentRepository>,
    courses: Arc<dyn CourseRepository>,
    lessons: Arc<dyn LessonRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        students: Arc<dyn StudentRepository>,
        courses: Arc<dyn CourseRepository>,
        lessons: Arc<dyn LessonRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            students,
            courses,
            lessons,
            enrollments,
            progress,
        }
    }

    /// Enroll a student. Enrolling twice returns the existing enrollment unchanged.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` if the student or course does not exist.
    /// Returns `EnrollmentServiceError::Storage` if persistence fails.
    #[tracing::instrument(skip(self))]
    pub async fn enroll(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        if self.students.get_student(student_id).await?.is_none() {
            return Err(EnrollmentServiceError::NotFound("student"));
        }
        if self.courses.get_course(course_id).await?.is_none() {
            return Err(EnrollmentServiceError::NotFound("course"));
        }
        if let Some(existing) = self.enrollments.get_enrollment(student_id, course_id).await? {
            tracing::debug!("already enrolled");
            return Ok(existing);
        }

        let enrollment = Enrollment::new(student_id, course_id, self.clock.now());
        match self.enrollments.insert_enrollment(&enrollment).await {
            Ok(()) => {
                tracing::info!("student enrolled");
                Ok(enrollment)
            }
            // A concurrent request won the insert; hand back its row.
            Err(StorageError::Conflict) => self
                .enrollments
                .get_enrollment(student_id, course_id)
                .await?
                .ok_or(EnrollmentServiceError::NotFound("enrollment")),
            Err(StorageError::NotFound) => Err(EnrollmentServiceError::NotFound("course")),
            Err(other) => Err(other.into()),
        }
    }

    /// Remove an enrollment together with the student's progress in that course.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::NotFound` if the student is not enrolled.
    #[tracing::instrument(skip(self))]
    pub async fn unenroll(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<(), EnrollmentServiceError> {
        match self.enrollments.delete_enrollment(student_id, course_id).await {
            Err(StorageError::NotFound) => Err(EnrollmentServiceError::NotFound("enrollment")),
            other => {
                other?;
                tracing::info!("student unenrolled");
                Ok(())
            }
        }
    }

    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` if repository access fails.
    pub async fn get_enrollment(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, EnrollmentServiceError> {
        Ok(self.enrollments.get_enrollment(student_id, course_id).await?)
    }

    /// Every course the student is enrolled in, with a fresh completion snapshot.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentServiceError::Storage` if repository access fails.
    pub async fn list_enrolled_courses(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<EnrolledCourse>, EnrollmentServiceError> {
        let enrollments = self.enrollments.list_enrollments(student_id).await?;
        let mut out = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let course_id = enrollment.course_id();
            let Some(course) = self.courses.get_course(course_id).await? else {
                tracing::warn!(%course_id, "enrollment points at a missing course");
                continue;
            };
            let lessons = self.lessons.list_lessons(course_id).await?;
            let progress = self
                .progress
                .list_course_progress(student_id, course_id)
                .await?;
            out.push(EnrolledCourse {
                course,
                enrollment,
                completion: CourseCompletion::compute(&lessons, &progress),
            });
        }
        Ok(out)
    }
}
