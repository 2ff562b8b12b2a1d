//! Acalog course catalog pages: listing structure and course detail panels.

pub mod errors;
pub mod extract;
pub mod listing;
pub mod models;

pub use errors::LayoutError;
pub use extract::extract_course;
pub use models::{CourseRecord, Credits, Field, NOT_AVAILABLE};
