//! Lesson progress tracking, completion roll-up and the unlock gate.

mod access;
mod service;
mod view;

pub use service::ProgressService;
pub use view::{CourseOutline, LessonOutlineItem, LessonView};
