//! Database layer
//!
//! Supports SQLite (default, single-file deployments) and MySQL, selected
//! by configuration.
//!
//! # Architecture
//!
//! `DatabasePool` abstracts over the two backends and is injected into
//! repositories as a `DynDatabasePool`. Statements are described by the
//! query objects in [`query`] and executed by [`repositories`].
//!
//! # Usage
//!
//! ```ignore
//! use folio::config::DatabaseConfig;
//! use folio::db::{create_pool, migrations};
//! use folio::db::repositories::{BlogRepository, SqlxBlogRepository};
//! use folio::models::Page;
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//!
//! let repo = SqlxBlogRepository::new(pool.clone());
//! let posts = repo.latest_posts(Page::default()).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod query;
pub mod repositories;

pub use error::{RepositoryError, RepositoryResult};
pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
