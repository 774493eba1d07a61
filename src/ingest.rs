//! Offline event ingestion.
//!
//! `cbr ingest <file>` replays a JSON array of lifecycle events through
//! the sync orchestrator — the same path the `/events` webhook takes.
//! Useful for initial loads from a CMS export and for reprocessing after
//! an outage. Sync failures are best-effort (counted mappings tell the
//! story; the command itself only fails on unreadable input).

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::gemini::{FileSearchProvider, GeminiClient};
use crate::models::SyncEvent;
use crate::settings::SettingsStore;
use crate::sync::SyncEngine;

pub async fn run_ingest(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events file: {}", path.display()))?;
    let events: Vec<SyncEvent> =
        serde_json::from_str(&content).with_context(|| "Failed to parse events file")?;

    let pool = db::connect(config).await?;
    let settings = SettingsStore::new(pool.clone());
    let provider: Arc<dyn FileSearchProvider> =
        Arc::new(GeminiClient::from_settings(config, &settings).await?);
    let engine = SyncEngine::new(
        pool.clone(),
        settings,
        provider,
        config.sync.page_size,
    );

    let event_count = events.len();
    for event in events {
        engine.handle_event(event).await;
    }

    let mirrored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_items")
        .fetch_one(&pool)
        .await?;
    let mapped: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM remote_documents")
        .fetch_one(&pool)
        .await?;

    println!("ingest {}", path.display());
    println!("  events: {}", event_count);
    println!("  mirrored items: {}", mirrored);
    println!("  mapped documents: {}", mapped);
    println!("ok");

    pool.close().await;
    Ok(())
}
