//! Folio - post and category storage for a personal blog
//!
//! This library provides the read-only data-access layer behind the site:
//! typed post/category records and the queries that list, look up and count
//! them.

pub mod config;
pub mod db;
pub mod models;
