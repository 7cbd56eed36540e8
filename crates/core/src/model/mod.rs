mod course;
mod enrollment;
mod ids;
mod lesson;
mod progress;
mod student;

pub use ids::{CategoryId, CourseId, LessonId, ParseIdError, StudentId};

pub use course::{Category, CategoryError, Course, CourseError};
pub use enrollment::{Enrollment, EnrollmentError, LearningStatus};
pub use lesson::{Lesson, LessonContent, LessonError, LessonKind, next_position, sort_lessons};
pub use progress::{
    Progress, ProgressError, ProgressOutcome, ProgressUpdate, VIDEO_COMPLETION_TOLERANCE_SECS,
};
pub use student::{Student, StudentError};
