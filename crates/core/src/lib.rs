#![forbid(unsafe_code)]

pub mod completion;
pub mod model;
pub mod time;
pub mod unlock;

pub use completion::CourseCompletion;
pub use time::Clock;
pub use unlock::LessonAccess;
