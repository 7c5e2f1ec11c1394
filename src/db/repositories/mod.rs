//! Database repositories
//!
//! Repository pattern implementations for database access.

pub mod blog;

pub use blog::{BlogRepository, SqlxBlogRepository};
