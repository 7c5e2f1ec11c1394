//! Repository error type

/// Errors returned by the blog repository
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// No row matched a unique lookup
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Month argument outside 1..=12, or a year chrono cannot represent
    #[error("Invalid month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },

    /// A post references a main category that does not exist
    #[error("Post {post_id} references missing category {category_id}")]
    MissingCategory { post_id: i64, category_id: i64 },

    /// Failure reported by the database layer
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl RepositoryError {
    pub(crate) fn not_found(entity: &'static str, key: &str) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;
