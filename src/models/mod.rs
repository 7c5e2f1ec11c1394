//! Data models
//!
//! Read-only projections of the posts and categories tables, plus the
//! pagination and archive types the repository hands back.

mod archive;
mod category;
mod post;

pub use archive::{MonthHistogram, MonthYearCount, YearCounts};
pub use category::Category;
pub use post::{Page, Post, PostSummary, DEFAULT_PAGE_SIZE};
