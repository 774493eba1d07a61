use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Local mirror of CMS content (source of truth stays in the CMS)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_items (
            id INTEGER PRIMARY KEY,
            type TEXT NOT NULL,
            status TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            body_html TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Mapping from content item to its uploaded remote document
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS remote_documents (
            content_id INTEGER PRIMARY KEY,
            document_name TEXT NOT NULL,
            store_name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Runtime-mutable settings (credential, store, model, indexable types)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 virtual table for autocomplete over the mirror.
    // FTS5 CREATE is not idempotent natively, so we check first.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='content_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE content_fts USING fts5(
                content_id UNINDEXED,
                title,
                body
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Erase everything Corpus Bridge persists: settings (including the
/// encryption key and encrypted credential), remote document mappings,
/// and the content mirror. Remote documents are not cascaded — recreate
/// the store upstream if a clean corpus is needed.
pub async fn run_purge(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query("DELETE FROM settings").execute(&pool).await?;
    sqlx::query("DELETE FROM remote_documents")
        .execute(&pool)
        .await?;
    sqlx::query("DELETE FROM content_fts").execute(&pool).await?;
    sqlx::query("DELETE FROM content_items")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
