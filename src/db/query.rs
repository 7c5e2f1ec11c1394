//! Explicit query objects
//!
//! Each repository listing or count is described by a small value
//! (`PostListQuery`, `PostCountQuery`) that renders one parameterized
//! statement. Every value reaches the database as a bound parameter; SQL
//! text is only ever assembled from static fragments and `?` placeholders,
//! which both SQLite and MySQL accept.

use chrono::{TimeZone, Utc};

use super::error::{RepositoryError, RepositoryResult};
use crate::config::DatabaseDriver;
use crate::models::Page;

const POST_COLUMNS: &str =
    "p.id, p.title, p.slug, p.published, p.date, p.content, p.maincategory_id";
const SUMMARY_COLUMNS: &str = "p.id, p.title, p.slug, p.published, p.date, p.maincategory_id";

/// Rendered SQL plus its bind values, in placeholder order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<i64>,
}

/// Half-open Unix epoch range `[start, end)` covering one UTC calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub start: i64,
    pub end: i64,
}

impl MonthRange {
    pub fn new(year: i32, month: u32) -> RepositoryResult<Self> {
        let invalid = || RepositoryError::InvalidMonth { year, month };

        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        let (next_year, next_month) = if month == 12 {
            (year.checked_add(1).ok_or_else(invalid)?, 1)
        } else {
            (year, month + 1)
        };

        let start = Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .ok_or_else(invalid)?;
        let end = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .ok_or_else(invalid)?;

        Ok(Self {
            start: start.timestamp(),
            end: end.timestamp(),
        })
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Which posts a listing or count covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    /// Posts linked to the category through `post_categories`
    InCategory(i64),
    /// Posts dated inside the month
    InMonth(MonthRange),
}

impl PostFilter {
    fn push_from(&self, sql: &mut String) {
        sql.push_str(" FROM posts p");
        if let PostFilter::InCategory(_) = self {
            sql.push_str(" INNER JOIN post_categories pc ON pc.post_id = p.id");
        }
    }

    fn push_where(&self, sql: &mut String, binds: &mut Vec<i64>, published_only: bool) {
        let mut clauses: Vec<&str> = Vec::new();
        if published_only {
            clauses.push("p.published = 1");
        }
        match *self {
            PostFilter::All => {}
            PostFilter::InCategory(category_id) => {
                clauses.push("pc.category_id = ?");
                binds.push(category_id);
            }
            PostFilter::InMonth(range) => {
                clauses.push("p.date >= ?");
                clauses.push("p.date < ?");
                binds.push(range.start);
                binds.push(range.end);
            }
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
    }
}

/// Columns a listing selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Full,
    Summary,
}

/// A newest-first, paginated post listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostListQuery {
    pub filter: PostFilter,
    pub published_only: bool,
    pub projection: Projection,
    pub page: Page,
}

impl PostListQuery {
    /// Published posts with full content
    pub fn published(filter: PostFilter, page: Page) -> Self {
        Self {
            filter,
            published_only: true,
            projection: Projection::Full,
            page,
        }
    }

    /// Most recent posts regardless of published state, without content
    pub fn recent_summaries(count: i64) -> Self {
        Self {
            filter: PostFilter::All,
            published_only: false,
            projection: Projection::Summary,
            page: Page::first(count),
        }
    }

    pub fn build(&self) -> Statement {
        let mut sql = String::from("SELECT ");
        sql.push_str(match self.projection {
            Projection::Full => POST_COLUMNS,
            Projection::Summary => SUMMARY_COLUMNS,
        });

        let mut binds = Vec::new();
        self.filter.push_from(&mut sql);
        self.filter
            .push_where(&mut sql, &mut binds, self.published_only);

        sql.push_str(" ORDER BY p.date DESC, p.id DESC LIMIT ? OFFSET ?");
        binds.push(self.page.count());
        binds.push(self.page.offset());

        Statement { sql, binds }
    }
}

/// Count of published posts matching a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostCountQuery {
    pub filter: PostFilter,
}

impl PostCountQuery {
    pub fn published(filter: PostFilter) -> Self {
        Self { filter }
    }

    pub fn build(&self) -> Statement {
        let mut sql = String::from("SELECT COUNT(*) AS count");
        let mut binds = Vec::new();
        self.filter.push_from(&mut sql);
        self.filter.push_where(&mut sql, &mut binds, true);
        Statement { sql, binds }
    }
}

/// Post lookup by exact slug
pub fn post_by_slug(projection: Projection) -> &'static str {
    match projection {
        Projection::Full => {
            "SELECT p.id, p.title, p.slug, p.published, p.date, p.content, p.maincategory_id FROM posts p WHERE p.slug = ?"
        }
        Projection::Summary => {
            "SELECT p.id, p.title, p.slug, p.published, p.date, p.maincategory_id FROM posts p WHERE p.slug = ?"
        }
    }
}

pub const CATEGORY_BY_SLUG: &str = "SELECT id, title, slug FROM categories WHERE slug = ?";

pub const CATEGORY_BY_ID: &str = "SELECT id, title, slug FROM categories WHERE id = ?";

pub const CATEGORIES_FOR_POST: &str = "SELECT c.id, c.title, c.slug FROM categories c INNER JOIN post_categories pc ON pc.category_id = c.id WHERE pc.post_id = ?";

/// Categories whose id is in `ids`, one placeholder per id.
///
/// Returns `None` for an empty id list so callers can skip the round trip.
pub fn categories_by_ids(ids: &[i64]) -> Option<Statement> {
    if ids.is_empty() {
        return None;
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    Some(Statement {
        sql: format!(
            "SELECT id, title, slug FROM categories WHERE id IN ({})",
            placeholders
        ),
        binds: ids.to_vec(),
    })
}

/// Post counts per UTC calendar month, newest first.
///
/// Counts every post; the published flag is not consulted.
pub fn month_counts(driver: DatabaseDriver) -> &'static str {
    match driver {
        DatabaseDriver::Sqlite => {
            r#"
            SELECT CAST(strftime('%Y', date, 'unixepoch') AS INTEGER) AS year,
                   CAST(strftime('%m', date, 'unixepoch') AS INTEGER) AS month,
                   COUNT(*) AS count
            FROM posts
            GROUP BY year, month
            ORDER BY year DESC, month DESC
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            SELECT CAST(YEAR(FROM_UNIXTIME(date)) AS SIGNED) AS year,
                   CAST(MONTH(FROM_UNIXTIME(date)) AS SIGNED) AS month,
                   COUNT(*) AS count
            FROM posts
            GROUP BY year, month
            ORDER BY year DESC, month DESC
            "#
        }
    }
}
