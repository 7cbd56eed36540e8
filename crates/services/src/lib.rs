#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod course_service;
pub mod enrollment_service;
pub mod error;
pub mod progress;
pub mod student_service;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use catalog_service::LessonCatalogService;
pub use course_service::CourseService;
pub use enrollment_service::{EnrolledCourse, EnrollmentService};
pub use error::{
    AccessDenied, AppServicesError, CatalogError, CourseServiceError, EnrollmentServiceError,
    ProgressServiceError, StudentServiceError,
};
pub use progress::{CourseOutline, LessonOutlineItem, LessonView, ProgressService};
pub use student_service::StudentService;
