//! Blog repository
//!
//! Read-only access to posts and categories.
//!
//! This module provides:
//! - `BlogRepository` trait defining the queries the site's pages need
//! - `SqlxBlogRepository` implementing the trait for SQLite and MySQL
//!
//! Listings and counts are rendered by the query objects in
//! [`crate::db::query`]; this module only binds, executes and maps rows.

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{MySql, MySqlPool, Row, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::error::{RepositoryError, RepositoryResult};
use crate::db::query::{
    self, MonthRange, PostCountQuery, PostFilter, PostListQuery, Projection, Statement,
};
use crate::db::DynDatabasePool;
use crate::models::{Category, MonthHistogram, MonthYearCount, Page, Post, PostSummary};

/// Blog repository trait
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Post with an exactly matching slug, main category resolved
    async fn get_by_slug(&self, slug: &str) -> RepositoryResult<Post>;

    /// Post summary with an exactly matching slug
    async fn get_summary_by_slug(&self, slug: &str) -> RepositoryResult<PostSummary>;

    /// Categories the post is cross-listed under, in storage order
    async fn categories_for_post(&self, post_id: i64) -> RepositoryResult<Vec<Category>>;

    /// Published posts, newest first
    async fn latest_posts(&self, page: Page) -> RepositoryResult<Vec<Post>>;

    /// Published posts linked to `category`, newest first
    async fn latest_posts_in_category(
        &self,
        category: &Category,
        page: Page,
    ) -> RepositoryResult<Vec<Post>>;

    /// Published posts dated within the given UTC month, newest first
    async fn latest_posts_for_month(
        &self,
        year: i32,
        month: u32,
        page: Page,
    ) -> RepositoryResult<Vec<Post>>;

    /// Most recent posts of any published state, without content
    async fn latest_posts_summary(&self, count: i64) -> RepositoryResult<Vec<PostSummary>>;

    /// Post counts per calendar month, including unpublished posts
    async fn month_counts(&self) -> RepositoryResult<MonthHistogram>;

    /// Category with an exactly matching slug
    async fn get_category(&self, slug: &str) -> RepositoryResult<Category>;

    /// Number of published posts
    async fn published_count(&self) -> RepositoryResult<i64>;

    /// Number of published posts linked to `category`
    async fn published_count_in_category(&self, category: &Category) -> RepositoryResult<i64>;

    /// Number of published posts dated within the given UTC month
    async fn published_count_for_month(&self, year: i32, month: u32) -> RepositoryResult<i64>;
}

/// SQLx-based blog repository
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

impl SqlxBlogRepository {
    /// Create a new SQLx blog repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }

    fn backend(&self) -> Result<Backend<'_>> {
        let backend = match self.pool.driver() {
            DatabaseDriver::Sqlite => self.pool.as_sqlite().map(Backend::Sqlite),
            DatabaseDriver::Mysql => self.pool.as_mysql().map(Backend::Mysql),
        };
        backend.ok_or_else(|| {
            anyhow::anyhow!("{:?} pool exposes no connection", self.pool.driver())
        })
    }

    async fn fetch_posts(&self, stmt: &Statement) -> Result<Vec<Post>> {
        match self.backend()? {
            Backend::Sqlite(pool) => fetch_posts_sqlite(pool, stmt).await,
            Backend::Mysql(pool) => fetch_posts_mysql(pool, stmt).await,
        }
    }

    async fn fetch_summaries(&self, stmt: &Statement) -> Result<Vec<PostSummary>> {
        match self.backend()? {
            Backend::Sqlite(pool) => fetch_summaries_sqlite(pool, stmt).await,
            Backend::Mysql(pool) => fetch_summaries_mysql(pool, stmt).await,
        }
    }

    async fn fetch_categories(&self, stmt: &Statement) -> Result<Vec<Category>> {
        match self.backend()? {
            Backend::Sqlite(pool) => fetch_categories_sqlite(pool, stmt).await,
            Backend::Mysql(pool) => fetch_categories_mysql(pool, stmt).await,
        }
    }

    async fn fetch_count(&self, stmt: &Statement) -> Result<i64> {
        match self.backend()? {
            Backend::Sqlite(pool) => fetch_count_sqlite(pool, stmt).await,
            Backend::Mysql(pool) => fetch_count_mysql(pool, stmt).await,
        }
    }

    async fn list_published(&self, filter: PostFilter, page: Page) -> RepositoryResult<Vec<Post>> {
        let stmt = PostListQuery::published(filter, page).build();
        let mut posts = self.fetch_posts(&stmt).await?;
        self.resolve_main_categories(&mut posts).await?;
        Ok(posts)
    }

    async fn count_published(&self, filter: PostFilter) -> RepositoryResult<i64> {
        let stmt = PostCountQuery::published(filter).build();
        Ok(self.fetch_count(&stmt).await?)
    }

    /// Attach every post's main category using a single `IN (...)` lookup.
    ///
    /// No query is issued for an empty slice. A post whose main category id
    /// is absent from the categories table fails the whole call.
    async fn resolve_main_categories(&self, posts: &mut [Post]) -> RepositoryResult<()> {
        let ids: Vec<i64> = posts
            .iter()
            .map(|p| p.main_category_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let Some(stmt) = query::categories_by_ids(&ids) else {
            return Ok(());
        };

        let by_id: HashMap<i64, Category> = self
            .fetch_categories(&stmt)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        tracing::debug!(
            "Resolved {} of {} main categories for {} posts",
            by_id.len(),
            ids.len(),
            posts.len()
        );

        for post in posts.iter_mut() {
            let category = by_id.get(&post.main_category_id).cloned();
            attach_or_missing(post, category)?;
        }

        Ok(())
    }

    // TODO: fold this second lookup into get_by_slug as a LEFT JOIN on categories.
    async fn resolve_main_category(&self, post: &mut Post) -> RepositoryResult<()> {
        let category = match self.backend()? {
            Backend::Sqlite(pool) => category_by_id_sqlite(pool, post.main_category_id).await?,
            Backend::Mysql(pool) => category_by_id_mysql(pool, post.main_category_id).await?,
        };
        attach_or_missing(post, category)
    }
}

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn get_by_slug(&self, slug: &str) -> RepositoryResult<Post> {
        let post = match self.backend()? {
            Backend::Sqlite(pool) => post_by_slug_sqlite(pool, slug).await?,
            Backend::Mysql(pool) => post_by_slug_mysql(pool, slug).await?,
        };
        let mut post = post.ok_or_else(|| RepositoryError::not_found("Post", slug))?;
        self.resolve_main_category(&mut post).await?;
        Ok(post)
    }

    async fn get_summary_by_slug(&self, slug: &str) -> RepositoryResult<PostSummary> {
        let summary = match self.backend()? {
            Backend::Sqlite(pool) => summary_by_slug_sqlite(pool, slug).await?,
            Backend::Mysql(pool) => summary_by_slug_mysql(pool, slug).await?,
        };
        summary.ok_or_else(|| RepositoryError::not_found("Post", slug))
    }

    async fn categories_for_post(&self, post_id: i64) -> RepositoryResult<Vec<Category>> {
        let stmt = Statement {
            sql: query::CATEGORIES_FOR_POST.to_string(),
            binds: vec![post_id],
        };
        Ok(self.fetch_categories(&stmt).await?)
    }

    async fn latest_posts(&self, page: Page) -> RepositoryResult<Vec<Post>> {
        self.list_published(PostFilter::All, page).await
    }

    async fn latest_posts_in_category(
        &self,
        category: &Category,
        page: Page,
    ) -> RepositoryResult<Vec<Post>> {
        self.list_published(PostFilter::InCategory(category.id), page)
            .await
    }

    async fn latest_posts_for_month(
        &self,
        year: i32,
        month: u32,
        page: Page,
    ) -> RepositoryResult<Vec<Post>> {
        let range = MonthRange::new(year, month)?;
        self.list_published(PostFilter::InMonth(range), page).await
    }

    async fn latest_posts_summary(&self, count: i64) -> RepositoryResult<Vec<PostSummary>> {
        let stmt = PostListQuery::recent_summaries(count).build();
        Ok(self.fetch_summaries(&stmt).await?)
    }

    async fn month_counts(&self) -> RepositoryResult<MonthHistogram> {
        let histogram = match self.backend()? {
            Backend::Sqlite(pool) => month_counts_sqlite(pool).await?,
            Backend::Mysql(pool) => month_counts_mysql(pool).await?,
        };
        Ok(histogram)
    }

    async fn get_category(&self, slug: &str) -> RepositoryResult<Category> {
        let category = match self.backend()? {
            Backend::Sqlite(pool) => category_by_slug_sqlite(pool, slug).await?,
            Backend::Mysql(pool) => category_by_slug_mysql(pool, slug).await?,
        };
        category.ok_or_else(|| RepositoryError::not_found("Category", slug))
    }

    async fn published_count(&self) -> RepositoryResult<i64> {
        self.count_published(PostFilter::All).await
    }

    async fn published_count_in_category(&self, category: &Category) -> RepositoryResult<i64> {
        self.count_published(PostFilter::InCategory(category.id))
            .await
    }

    async fn published_count_for_month(&self, year: i32, month: u32) -> RepositoryResult<i64> {
        let range = MonthRange::new(year, month)?;
        self.count_published(PostFilter::InMonth(range)).await
    }
}

fn timestamp_to_utc(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("Post date out of range: {}", secs))
}

/// Attach `category` as the post's main category; a missing or mismatched
/// category is a `MissingCategory` error.
fn attach_or_missing(post: &mut Post, category: Option<Category>) -> RepositoryResult<()> {
    match category {
        Some(category) if post.attach_main_category(category.clone()) => Ok(()),
        _ => Err(RepositoryError::MissingCategory {
            post_id: post.id,
            category_id: post.main_category_id,
        }),
    }
}

/// NULL buckets come from dates the database cannot convert
/// (past 9999-12-31, or before 1970 on MySQL).
fn month_row(year: Option<i64>, month: Option<i64>, count: i64) -> Result<MonthYearCount> {
    let (Some(year), Some(month)) = (year, month) else {
        anyhow::bail!("Post date cannot be bucketed into a month ({} post(s))", count);
    };
    Ok(MonthYearCount {
        year: i32::try_from(year).with_context(|| format!("Year out of range: {}", year))?,
        month: u32::try_from(month).with_context(|| format!("Month out of range: {}", month))?,
        count,
    })
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn bind_sqlite(stmt: &Statement) -> sqlx::query::Query<'_, Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    stmt.binds
        .iter()
        .fold(sqlx::query::<Sqlite>(&stmt.sql), |q, value| q.bind(*value))
}

async fn fetch_posts_sqlite(pool: &SqlitePool, stmt: &Statement) -> Result<Vec<Post>> {
    let rows = bind_sqlite(stmt)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

async fn fetch_summaries_sqlite(pool: &SqlitePool, stmt: &Statement) -> Result<Vec<PostSummary>> {
    let rows = bind_sqlite(stmt)
        .fetch_all(pool)
        .await
        .context("Failed to list post summaries")?;

    rows.iter().map(row_to_summary_sqlite).collect()
}

async fn fetch_categories_sqlite(pool: &SqlitePool, stmt: &Statement) -> Result<Vec<Category>> {
    let rows = bind_sqlite(stmt)
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;

    rows.iter().map(row_to_category_sqlite).collect()
}

async fn fetch_count_sqlite(pool: &SqlitePool, stmt: &Statement) -> Result<i64> {
    let row = bind_sqlite(stmt)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    Ok(row.try_get("count")?)
}

async fn post_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Post>> {
    let row = sqlx::query(query::post_by_slug(Projection::Full))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn summary_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<PostSummary>> {
    let row = sqlx::query(query::post_by_slug(Projection::Summary))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post summary by slug")?;

    row.as_ref().map(row_to_summary_sqlite).transpose()
}

async fn category_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query(query::CATEGORY_BY_SLUG)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by slug")?;

    row.as_ref().map(row_to_category_sqlite).transpose()
}

async fn category_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(query::CATEGORY_BY_ID)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by ID")?;

    row.as_ref().map(row_to_category_sqlite).transpose()
}

async fn month_counts_sqlite(pool: &SqlitePool) -> Result<MonthHistogram> {
    let rows = sqlx::query(query::month_counts(DatabaseDriver::Sqlite))
        .fetch_all(pool)
        .await
        .context("Failed to count posts by month")?;

    let mut histogram = MonthHistogram::new();
    for row in rows {
        histogram.push(month_row(
            row.try_get("year")?,
            row.try_get("month")?,
            row.try_get("count")?,
        )?);
    }
    Ok(histogram)
}

fn row_to_post_sqlite(row: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        published: row.try_get("published")?,
        date: timestamp_to_utc(row.try_get("date")?)?,
        content: row.try_get("content")?,
        main_category_id: row.try_get("maincategory_id")?,
        main_category: None,
    })
}

fn row_to_summary_sqlite(row: &SqliteRow) -> Result<PostSummary> {
    Ok(PostSummary {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        published: row.try_get("published")?,
        date: timestamp_to_utc(row.try_get("date")?)?,
        main_category_id: row.try_get("maincategory_id")?,
    })
}

fn row_to_category_sqlite(row: &SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn bind_mysql(stmt: &Statement) -> sqlx::query::Query<'_, MySql, sqlx::mysql::MySqlArguments> {
    stmt.binds
        .iter()
        .fold(sqlx::query::<MySql>(&stmt.sql), |q, value| q.bind(*value))
}

async fn fetch_posts_mysql(pool: &MySqlPool, stmt: &Statement) -> Result<Vec<Post>> {
    let rows = bind_mysql(stmt)
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    rows.iter().map(row_to_post_mysql).collect()
}

async fn fetch_summaries_mysql(pool: &MySqlPool, stmt: &Statement) -> Result<Vec<PostSummary>> {
    let rows = bind_mysql(stmt)
        .fetch_all(pool)
        .await
        .context("Failed to list post summaries")?;

    rows.iter().map(row_to_summary_mysql).collect()
}

async fn fetch_categories_mysql(pool: &MySqlPool, stmt: &Statement) -> Result<Vec<Category>> {
    let rows = bind_mysql(stmt)
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;

    rows.iter().map(row_to_category_mysql).collect()
}

async fn fetch_count_mysql(pool: &MySqlPool, stmt: &Statement) -> Result<i64> {
    let row = bind_mysql(stmt)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    Ok(row.try_get("count")?)
}

async fn post_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Post>> {
    let row = sqlx::query(query::post_by_slug(Projection::Full))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post by slug")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn summary_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<PostSummary>> {
    let row = sqlx::query(query::post_by_slug(Projection::Summary))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get post summary by slug")?;

    row.as_ref().map(row_to_summary_mysql).transpose()
}

async fn category_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query(query::CATEGORY_BY_SLUG)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by slug")?;

    row.as_ref().map(row_to_category_mysql).transpose()
}

async fn category_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(query::CATEGORY_BY_ID)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get category by ID")?;

    row.as_ref().map(row_to_category_mysql).transpose()
}

async fn month_counts_mysql(pool: &MySqlPool) -> Result<MonthHistogram> {
    let rows = sqlx::query(query::month_counts(DatabaseDriver::Mysql))
        .fetch_all(pool)
        .await
        .context("Failed to count posts by month")?;

    let mut histogram = MonthHistogram::new();
    for row in rows {
        histogram.push(month_row(
            row.try_get("year")?,
            row.try_get("month")?,
            row.try_get("count")?,
        )?);
    }
    Ok(histogram)
}

fn row_to_post_mysql(row: &MySqlRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        published: row.try_get("published")?,
        date: timestamp_to_utc(row.try_get("date")?)?,
        content: row.try_get("content")?,
        main_category_id: row.try_get("maincategory_id")?,
        main_category: None,
    })
}

fn row_to_summary_mysql(row: &MySqlRow) -> Result<PostSummary> {
    Ok(PostSummary {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        published: row.try_get("published")?,
        date: timestamp_to_utc(row.try_get("date")?)?,
        main_category_id: row.try_get("maincategory_id")?,
    })
}

fn row_to_category_mysql(row: &MySqlRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxBlogRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxBlogRepository::new(pool.clone());
        (pool, repo)
    }

    fn epoch(year: i32, month: u32, day: u32) -> i64 {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .unwrap()
            .timestamp()
    }

    async fn insert_category(pool: &SqlitePool, id: i64, slug: &str) -> Category {
        let title = format!("Category {}", slug);
        sqlx::query("INSERT INTO categories (id, title, slug) VALUES (?, ?, ?)")
            .bind(id)
            .bind(&title)
            .bind(slug)
            .execute(pool)
            .await
            .expect("Failed to create test category");
        Category::new(id, title, slug)
    }

    async fn insert_post(
        pool: &SqlitePool,
        id: i64,
        slug: &str,
        published: bool,
        date: i64,
        main_category_id: i64,
    ) {
        sqlx::query(
            "INSERT INTO posts (id, title, slug, published, date, content, maincategory_id) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("Title {}", slug))
        .bind(slug)
        .bind(published)
        .bind(date)
        .bind(format!("Content for {}", slug))
        .bind(main_category_id)
        .execute(pool)
        .await
        .expect("Failed to create test post");
    }

    async fn link(pool: &SqlitePool, post_id: i64, category_id: i64) {
        sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(category_id)
            .execute(pool)
            .await
            .expect("Failed to link post to category");
    }

    /// Two categories and five posts spread over 2021:
    ///
    /// | id | slug    | published | date       | main | linked   |
    /// |----|---------|-----------|------------|------|----------|
    /// | 1  | march-1 | yes       | 2021-03-01 | 1    | 1        |
    /// | 2  | march-2 | no        | 2021-03-15 | 1    | 1        |
    /// | 3  | april   | yes       | 2021-04-01 | 2    | 1, 2     |
    /// | 4  | may     | yes       | 2021-05-20 | 2    | 2        |
    /// | 5  | june    | yes       | 2021-06-02 | 1    | (none)   |
    async fn seed(pool: &SqlitePool) -> (Category, Category) {
        let rust = insert_category(pool, 1, "rust").await;
        let travel = insert_category(pool, 2, "travel").await;

        insert_post(pool, 1, "march-1", true, epoch(2021, 3, 1), 1).await;
        insert_post(pool, 2, "march-2", false, epoch(2021, 3, 15), 1).await;
        insert_post(pool, 3, "april", true, epoch(2021, 4, 1), 2).await;
        insert_post(pool, 4, "may", true, epoch(2021, 5, 20), 2).await;
        insert_post(pool, 5, "june", true, epoch(2021, 6, 2), 1).await;

        link(pool, 1, 1).await;
        link(pool, 2, 1).await;
        link(pool, 3, 1).await;
        link(pool, 3, 2).await;
        link(pool, 4, 2).await;

        (rust, travel)
    }

    fn slugs(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    #[tokio::test]
    async fn test_get_by_slug_resolves_main_category() {
        let (pool, repo) = setup_test_repo().await;
        let (_, travel) = seed(pool.as_sqlite().unwrap()).await;

        let post = repo.get_by_slug("april").await.expect("Failed to get post");

        assert_eq!(post.id, 3);
        assert_eq!(post.slug, "april");
        assert!(post.published);
        assert_eq!(post.date.timestamp(), epoch(2021, 4, 1));
        assert_eq!(post.content, "Content for april");
        assert_eq!(post.main_category_id, 2);
        assert_eq!(post.main_category, Some(travel));
    }

    #[tokio::test]
    async fn test_get_by_slug_returns_unpublished_posts() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        let post = repo.get_by_slug("march-2").await.expect("Failed to get post");

        assert!(!post.published);
    }

    #[tokio::test]
    async fn test_get_by_slug_is_case_sensitive() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        let err = repo.get_by_slug("April").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Post not found: April");
    }

    #[tokio::test]
    async fn test_slug_lookups_not_found() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        assert!(repo.get_by_slug("missing").await.unwrap_err().is_not_found());
        assert!(repo
            .get_summary_by_slug("missing")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(matches!(
            repo.get_category("missing").await,
            Err(RepositoryError::NotFound { entity: "Category", .. })
        ));
    }

    #[tokio::test]
    async fn test_get_by_slug_with_dangling_category() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        insert_post(sqlite_pool, 9, "orphan", true, epoch(2022, 1, 1), 77).await;

        let err = repo.get_by_slug("orphan").await.unwrap_err();

        assert!(matches!(
            err,
            RepositoryError::MissingCategory { post_id: 9, category_id: 77 }
        ));
    }

    #[tokio::test]
    async fn test_get_summary_by_slug() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        let summary = repo
            .get_summary_by_slug("may")
            .await
            .expect("Failed to get summary");

        assert_eq!(summary.id, 4);
        assert_eq!(summary.title, "Title may");
        assert_eq!(summary.main_category_id, 2);
        assert_eq!(summary.date.timestamp(), epoch(2021, 5, 20));
    }

    #[tokio::test]
    async fn test_get_category() {
        let (pool, repo) = setup_test_repo().await;
        let (rust, _) = seed(pool.as_sqlite().unwrap()).await;

        let found = repo.get_category("rust").await.expect("Failed to get category");

        assert_eq!(found, rust);
    }

    #[tokio::test]
    async fn test_categories_for_post() {
        let (pool, repo) = setup_test_repo().await;
        let (rust, travel) = seed(pool.as_sqlite().unwrap()).await;

        let mut linked = repo.categories_for_post(3).await.expect("Failed to list");
        linked.sort_by_key(|c| c.id);
        assert_eq!(linked, vec![rust, travel]);

        let none = repo.categories_for_post(5).await.expect("Failed to list");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_latest_posts_published_newest_first() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        let posts = repo.latest_posts(Page::default()).await.expect("Failed to list");

        assert_eq!(slugs(&posts), vec!["june", "may", "april", "march-1"]);
        for post in &posts {
            assert!(post.published);
            let category = post.main_category.as_ref().expect("main category resolved");
            assert_eq!(category.id, post.main_category_id);
        }
        assert!(posts.windows(2).all(|w| w[0].date >= w[1].date));
    }

    #[tokio::test]
    async fn test_latest_posts_pagination() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        let first = repo.latest_posts(Page::first(2)).await.unwrap();
        let second = repo.latest_posts(Page::first(2).next()).await.unwrap();
        let past_end = repo.latest_posts(Page::new(2, 10)).await.unwrap();

        assert_eq!(slugs(&first), vec!["june", "may"]);
        assert_eq!(slugs(&second), vec!["april", "march-1"]);
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_latest_posts_empty_database() {
        let (_pool, repo) = setup_test_repo().await;

        let posts = repo.latest_posts(Page::default()).await.expect("Failed to list");

        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_latest_posts_fails_on_dangling_category() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        seed(sqlite_pool).await;
        insert_post(sqlite_pool, 6, "orphan", true, epoch(2021, 7, 1), 99).await;

        let err = repo.latest_posts(Page::default()).await.unwrap_err();

        assert!(matches!(
            err,
            RepositoryError::MissingCategory { post_id: 6, category_id: 99 }
        ));
    }

    #[tokio::test]
    async fn test_latest_posts_in_category() {
        let (pool, repo) = setup_test_repo().await;
        let (rust, travel) = seed(pool.as_sqlite().unwrap()).await;

        let rust_posts = repo
            .latest_posts_in_category(&rust, Page::default())
            .await
            .expect("Failed to list");
        let travel_posts = repo
            .latest_posts_in_category(&travel, Page::default())
            .await
            .expect("Failed to list");

        // "june" has rust as its main category but no association row
        assert_eq!(slugs(&rust_posts), vec!["april", "march-1"]);
        assert_eq!(slugs(&travel_posts), vec!["may", "april"]);
        assert!(rust_posts.iter().all(|p| p.main_category.is_some()));
    }

    #[tokio::test]
    async fn test_category_count_matches_unbounded_listing() {
        let (pool, repo) = setup_test_repo().await;
        let (rust, travel) = seed(pool.as_sqlite().unwrap()).await;

        for category in [&rust, &travel] {
            let all = repo
                .latest_posts_in_category(category, Page::unbounded())
                .await
                .unwrap();
            let count = repo.published_count_in_category(category).await.unwrap();
            assert_eq!(count, all.len() as i64);
        }
    }

    #[tokio::test]
    async fn test_month_listing_and_count() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        let march = repo
            .latest_posts_for_month(2021, 3, Page::default())
            .await
            .expect("Failed to list");
        let april = repo
            .latest_posts_for_month(2021, 4, Page::default())
            .await
            .expect("Failed to list");

        assert_eq!(slugs(&march), vec!["march-1"]);
        // 2021-04-01T00:00:00Z belongs to April only
        assert_eq!(slugs(&april), vec!["april"]);
        assert_eq!(repo.published_count_for_month(2021, 3).await.unwrap(), 1);
        assert_eq!(repo.published_count_for_month(2021, 4).await.unwrap(), 1);
        assert_eq!(repo.published_count_for_month(2020, 3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_month_queries_reject_invalid_month() {
        let (_pool, repo) = setup_test_repo().await;

        assert!(matches!(
            repo.latest_posts_for_month(2021, 13, Page::default()).await,
            Err(RepositoryError::InvalidMonth { year: 2021, month: 13 })
        ));
        assert!(matches!(
            repo.published_count_for_month(2021, 0).await,
            Err(RepositoryError::InvalidMonth { .. })
        ));
    }

    #[tokio::test]
    async fn test_month_counts_include_unpublished_posts() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        let histogram = repo.month_counts().await.expect("Failed to count");

        assert_eq!(histogram.count(2021, 3), Some(2));
        assert_eq!(histogram.count(2021, 4), Some(1));
        assert_eq!(histogram.total(), 5);
        assert_eq!(repo.published_count().await.unwrap(), 4);

        let months: Vec<u32> = histogram
            .year(2021)
            .unwrap()
            .months
            .iter()
            .map(|(m, _)| *m)
            .collect();
        assert_eq!(months, vec![6, 5, 4, 3]);
    }

    #[tokio::test]
    async fn test_month_counts_order_years_descending() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        insert_category(sqlite_pool, 1, "rust").await;
        insert_post(sqlite_pool, 1, "old", true, epoch(2019, 12, 31), 1).await;
        insert_post(sqlite_pool, 2, "new", true, epoch(2023, 1, 1), 1).await;
        insert_post(sqlite_pool, 3, "mid", false, epoch(2021, 8, 9), 1).await;

        let histogram = repo.month_counts().await.unwrap();
        let years: Vec<i32> = histogram.years().map(|y| y.year).collect();

        assert_eq!(years, vec![2023, 2021, 2019]);
        assert_eq!(histogram.count(2019, 12), Some(1));
    }

    #[tokio::test]
    async fn test_latest_posts_summary_includes_unpublished() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        let summaries = repo.latest_posts_summary(10).await.expect("Failed to list");
        let summary_slugs: Vec<&str> = summaries.iter().map(|s| s.slug.as_str()).collect();

        assert_eq!(
            summary_slugs,
            vec!["june", "may", "april", "march-2", "march-1"]
        );

        let limited = repo.latest_posts_summary(2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_published_count() {
        let (pool, repo) = setup_test_repo().await;

        assert_eq!(repo.published_count().await.unwrap(), 0);

        seed(pool.as_sqlite().unwrap()).await;
        assert_eq!(repo.published_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let (pool, repo) = setup_test_repo().await;
        pool.execute("DROP TABLE post_categories")
            .await
            .expect("Failed to drop table");

        let err = repo.categories_for_post(1).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Storage(_)));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_boxed_repository_is_shareable() {
        let (pool, _) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;
        let repo = SqlxBlogRepository::boxed(pool.clone());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.published_count().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 4);
        }
    }

    #[tokio::test]
    async fn test_latest_posts_paginate_through_shared_timestamps() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        insert_category(sqlite_pool, 1, "rust").await;
        let date = epoch(2022, 2, 2);
        for (id, slug) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
            insert_post(sqlite_pool, id, slug, true, date, 1).await;
        }

        let mut seen = Vec::new();
        let mut page = Page::first(1);
        loop {
            let posts = repo.latest_posts(page).await.unwrap();
            if posts.is_empty() {
                break;
            }
            seen.extend(posts.into_iter().map(|p| p.slug));
            page = page.next();
        }

        assert_eq!(seen, vec!["d", "c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_negative_page_count_returns_no_rows() {
        let (pool, repo) = setup_test_repo().await;
        seed(pool.as_sqlite().unwrap()).await;

        let posts = repo.latest_posts(Page::new(-1, 0)).await.unwrap();

        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_month_counts_fail_on_unbucketable_date() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite_pool = pool.as_sqlite().unwrap();
        insert_category(sqlite_pool, 1, "rust").await;
        insert_post(sqlite_pool, 1, "march", true, epoch(2021, 3, 1), 1).await;
        // 10000-01-01T00:00:00Z, beyond what strftime can format
        insert_post(sqlite_pool, 2, "far-future", true, 253_402_300_800, 1).await;

        let err = repo.month_counts().await.unwrap_err();

        assert!(matches!(err, RepositoryError::Storage(_)));
        assert!(err.to_string().contains("cannot be bucketed"));
        assert_eq!(repo.published_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_attach_rejects_mismatched_category() {
        let (pool, repo) = setup_test_repo().await;
        let (rust, travel) = seed(pool.as_sqlite().unwrap()).await;
        let mut post = repo.get_by_slug("april").await.unwrap();
        post.main_category = None;

        assert!(matches!(
            attach_or_missing(&mut post, Some(rust)),
            Err(RepositoryError::MissingCategory { post_id: 3, category_id: 2 })
        ));
        assert!(post.main_category.is_none());
        assert!(matches!(
            attach_or_missing(&mut post, None),
            Err(RepositoryError::MissingCategory { .. })
        ));

        attach_or_missing(&mut post, Some(travel.clone())).unwrap();
        assert_eq!(post.main_category, Some(travel));
    }

    mod mysql {
        use super::*;
        use crate::config::{DatabaseConfig, DatabaseDriver};
        use crate::db::create_pool;

        async fn setup_mysql_repo() -> (DynDatabasePool, SqlxBlogRepository) {
            let url = std::env::var("MYSQL_TEST_URL")
                .unwrap_or_else(|_| "mysql://root@localhost/test".to_string());
            let config = DatabaseConfig {
                driver: DatabaseDriver::Mysql,
                url,
                max_connections: 2,
            };
            let pool = create_pool(&config)
                .await
                .expect("Failed to connect to MySQL");
            migrations::run_migrations(&pool)
                .await
                .expect("Failed to run migrations");
            for table in ["post_categories", "posts", "categories"] {
                pool.execute(&format!("DELETE FROM {}", table))
                    .await
                    .expect("Failed to clear table");
            }
            let repo = SqlxBlogRepository::new(pool.clone());
            (pool, repo)
        }

        async fn insert_category(pool: &MySqlPool, id: i64, slug: &str) -> Category {
            let title = format!("Category {}", slug);
            sqlx::query("INSERT INTO categories (id, title, slug) VALUES (?, ?, ?)")
                .bind(id)
                .bind(&title)
                .bind(slug)
                .execute(pool)
                .await
                .expect("Failed to create test category");
            Category::new(id, title, slug)
        }

        async fn insert_post(
            pool: &MySqlPool,
            id: i64,
            slug: &str,
            published: bool,
            date: i64,
            main_category_id: i64,
        ) {
            sqlx::query(
                "INSERT INTO posts (id, title, slug, published, date, content, maincategory_id) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(format!("Title {}", slug))
            .bind(slug)
            .bind(published)
            .bind(date)
            .bind(format!("Content for {}", slug))
            .bind(main_category_id)
            .execute(pool)
            .await
            .expect("Failed to create test post");
        }

        async fn link(pool: &MySqlPool, post_id: i64, category_id: i64) {
            sqlx::query("INSERT INTO post_categories (post_id, category_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(category_id)
                .execute(pool)
                .await
                .expect("Failed to link post to category");
        }

        /// Same fixture as the SQLite `seed`
        async fn seed(pool: &MySqlPool) -> (Category, Category) {
            let rust = insert_category(pool, 1, "rust").await;
            let travel = insert_category(pool, 2, "travel").await;

            insert_post(pool, 1, "march-1", true, epoch(2021, 3, 1), 1).await;
            insert_post(pool, 2, "march-2", false, epoch(2021, 3, 15), 1).await;
            insert_post(pool, 3, "april", true, epoch(2021, 4, 1), 2).await;
            insert_post(pool, 4, "may", true, epoch(2021, 5, 20), 2).await;
            insert_post(pool, 5, "june", true, epoch(2021, 6, 2), 1).await;

            link(pool, 1, 1).await;
            link(pool, 2, 1).await;
            link(pool, 3, 1).await;
            link(pool, 3, 2).await;
            link(pool, 4, 2).await;

            (rust, travel)
        }

        // One test per server: every run clears and reseeds the same tables.
        #[tokio::test]
        #[ignore = "Requires MySQL server"]
        async fn test_mysql_blog_queries() {
            let (pool, repo) = setup_mysql_repo().await;
            let mysql_pool = pool.as_mysql().unwrap();
            let (rust, travel) = seed(mysql_pool).await;

            let histogram = repo.month_counts().await.expect("Failed to count");
            assert_eq!(histogram.count(2021, 3), Some(2));
            assert_eq!(histogram.count(2021, 4), Some(1));
            assert_eq!(histogram.total(), 5);
            assert_eq!(repo.published_count_for_month(2021, 3).await.unwrap(), 1);
            let years: Vec<i32> = histogram.years().map(|y| y.year).collect();
            assert_eq!(years, vec![2021]);

            let post = repo.get_by_slug("april").await.expect("Failed to get post");
            assert_eq!(post.main_category, Some(travel.clone()));
            assert!(repo.get_by_slug("April").await.unwrap_err().is_not_found());
            assert!(repo.get_category("Rust").await.unwrap_err().is_not_found());

            let rust_posts = repo
                .latest_posts_in_category(&rust, Page::default())
                .await
                .expect("Failed to list");
            let travel_posts = repo
                .latest_posts_in_category(&travel, Page::default())
                .await
                .expect("Failed to list");
            assert_eq!(slugs(&rust_posts), vec!["april", "march-1"]);
            assert_eq!(slugs(&travel_posts), vec!["may", "april"]);
            assert_eq!(repo.published_count_in_category(&rust).await.unwrap(), 2);

            let latest = repo.latest_posts(Page::first(2).next()).await.unwrap();
            assert_eq!(slugs(&latest), vec!["april", "march-1"]);

            // FROM_UNIXTIME yields NULL before the epoch
            insert_post(mysql_pool, 6, "before-epoch", true, -86_400, 1).await;
            assert!(matches!(
                repo.month_counts().await,
                Err(RepositoryError::Storage(_))
            ));

            pool.close().await;
        }
    }
}
