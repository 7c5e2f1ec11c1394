//! Category model

use serde::{Deserialize, Serialize};

/// A blog category.
///
/// Posts reference one category as their main category and may be
/// cross-listed under others through the association table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Display title
    pub title: String,
    /// URL-friendly slug, unique among categories
    pub slug: String,
}

impl Category {
    pub fn new(id: i64, title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            slug: slug.into(),
        }
    }
}
