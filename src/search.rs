//! Autocomplete search over the local content mirror.
//!
//! This is the non-AI half of the search surface: a length-validated
//! keyword lookup answering with `{url, title}` pairs, fast enough to sit
//! behind a keystroke debounce. Only published items of the currently
//! indexable types are searched, so changing the type set takes effect
//! immediately without re-syncing.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::{Source, STATUS_PUBLISHED};
use crate::settings::SettingsStore;

pub const MIN_QUERY_LEN: usize = 3;
pub const MAX_QUERY_LEN: usize = 50;
pub const MAX_RESULTS: i64 = 10;

/// Reject out-of-bounds queries before touching the database.
pub fn validate_query(query: &str) -> Result<()> {
    let len = query.chars().count();
    if !(MIN_QUERY_LEN..=MAX_QUERY_LEN).contains(&len) {
        anyhow::bail!(
            "query must be between {} and {} characters",
            MIN_QUERY_LEN,
            MAX_QUERY_LEN
        );
    }
    Ok(())
}

/// FTS match over title+body of the mirror, capped at [`MAX_RESULTS`].
pub async fn autocomplete(
    pool: &SqlitePool,
    settings: &SettingsStore,
    query: &str,
) -> Result<Vec<Source>> {
    validate_query(query)?;

    let types = settings.indexable_types().await?;
    if types.is_empty() {
        return Ok(Vec::new());
    }

    // A query of only quotes/whitespace leaves nothing to match
    let match_expr = fts_match_expr(query);
    if match_expr.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; types.len()].join(", ");
    let sql = format!(
        r#"
        SELECT c.url, c.title
        FROM content_fts
        JOIN content_items c ON c.id = content_fts.content_id
        WHERE content_fts MATCH ? AND c.status = ? AND c.type IN ({})
        ORDER BY rank
        LIMIT ?
        "#,
        placeholders
    );

    let mut q = sqlx::query(&sql)
        .bind(match_expr)
        .bind(STATUS_PUBLISHED);
    for t in &types {
        q = q.bind(t);
    }
    let rows = q.bind(MAX_RESULTS).fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(|row| Source {
            url: row.get("url"),
            title: row.get("title"),
        })
        .collect())
}

/// Quote each term so user input can't inject FTS5 operators. Terms that
/// are empty after quote-stripping would be FTS5 syntax errors and are
/// dropped.
fn fts_match_expr(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| term.replace('"', ""))
        .filter(|term| !term.is_empty())
        .map(|term| format!("\"{}\"", term))
        .collect::<Vec<_>>()
        .join(" ")
}

/// CLI entry point for `cbr search`.
pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let settings = SettingsStore::new(pool.clone());

    let results = autocomplete(&pool, &settings, query).await?;

    if results.is_empty() {
        println!("No results.");
    } else {
        for source in &results {
            println!("{}  {}", source.url, source.title);
        }
    }

    pool.close().await;
    Ok(())
}
