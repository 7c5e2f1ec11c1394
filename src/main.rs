//! Folio - prints the blog's archive summary

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::{
    config::Config,
    db::{self, repositories::SqlxBlogRepository},
    models::Page,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yml".to_string());
    let config = Config::load_with_env(Path::new(&config_path))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Configuration loaded from {}", config_path);

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;

    let repo = SqlxBlogRepository::boxed(pool.clone());

    let published = repo.published_count().await?;
    tracing::info!("{} published post(s)", published);

    for post in repo.latest_posts(Page::first(5)).await? {
        let category = post
            .main_category
            .as_ref()
            .map(|c| c.title.as_str())
            .unwrap_or("-");
        tracing::info!("{} {} [{}]", post.date.format("%Y-%m-%d"), post.slug, category);
    }

    let histogram = repo.month_counts().await?;
    if histogram.is_empty() {
        tracing::info!("Archive is empty");
    }
    println!("{}", serde_json::to_string_pretty(&histogram)?);

    pool.close().await;
    Ok(())
}
