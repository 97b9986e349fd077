pub mod domain;
pub mod repository;

pub use domain::{ContentError, ContentType};
pub use repository::PostStats;
