//! Post model
//!
//! This module provides:
//! - `Post`, a full blog post including its body
//! - `PostSummary`, the body-less projection used by listing pages
//! - `Page`, offset/count pagination for the listing queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Category;

/// Number of posts returned by a listing when no count is given
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Blog post entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Post title
    pub title: String,
    /// URL-friendly slug
    pub slug: String,
    /// Whether the post is visible to the public
    pub published: bool,
    /// Publication timestamp (stored as Unix epoch seconds)
    pub date: DateTime<Utc>,
    /// Body content
    pub content: String,
    /// ID of the post's main category
    pub main_category_id: i64,
    /// Main category, only present once the repository has resolved it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_category: Option<Category>,
}

impl Post {
    /// Attach the resolved main category.
    ///
    /// Returns `false` and leaves the post untouched when `category` is not
    /// the one `main_category_id` points at.
    pub fn attach_main_category(&mut self, category: Category) -> bool {
        if category.id != self.main_category_id {
            return false;
        }
        self.main_category = Some(category);
        true
    }

    /// Listing projection of this post
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            title: self.title.clone(),
            slug: self.slug.clone(),
            published: self.published,
            date: self.date,
            main_category_id: self.main_category_id,
        }
    }
}

/// Post without body content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub published: bool,
    pub date: DateTime<Utc>,
    pub main_category_id: i64,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        post.summary()
    }
}

/// Offset/count pagination. Both values are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    count: i64,
    offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            count: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Page {
    pub fn new(count: i64, offset: i64) -> Self {
        Self {
            count: count.max(0),
            offset: offset.max(0),
        }
    }

    /// First `count` rows
    pub fn first(count: i64) -> Self {
        Self::new(count, 0)
    }

    /// Every row from the start; used for whole-set comparisons against counts
    pub fn unbounded() -> Self {
        Self {
            count: i64::MAX,
            offset: 0,
        }
    }

    /// Maximum number of rows to return
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Number of rows to skip
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// The page following this one
    pub fn next(self) -> Self {
        Self {
            count: self.count,
            offset: self.offset.saturating_add(self.count),
        }
    }
}
