//! Content sync orchestration.
//!
//! Maps content lifecycle events to File Search operations while keeping
//! the local mirror and the remote-document mapping consistent:
//!
//! | Event | Action |
//! |-------|--------|
//! | saved, indexable + published | delete old remote doc → transform → upload → record mapping |
//! | saved, not published | delete old remote doc, clear mapping |
//! | saved, type not indexable | mirror only, mapping untouched |
//! | deleted | delete old remote doc, clear mapping, drop mirror row |
//! | backfill page | per item: delete-old → transform → upload; failures counted |
//!
//! Invariant: at most one live remote document per content item —
//! delete-before-create, never the reverse. Remote deletion is
//! best-effort: the mapping is cleared even when the delete fails, and a
//! dangling remote document is accepted drift.
//!
//! Concurrent saves of the same item are serialized by a per-item
//! advisory lock; different items sync independently.

use anyhow::Result;
use regex::Regex;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::gemini::FileSearchProvider;
use crate::models::{BackfillReport, ContentItem, SyncEvent, STATUS_PUBLISHED};
use crate::settings::SettingsStore;
use crate::transform;

/// Per-item advisory locks. Shared across engine instances (the server
/// builds a fresh engine per request but keeps one lock map) so
/// concurrent syncs of the same item stay serialized.
pub type ItemLocks = Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>;

pub struct SyncEngine {
    pool: SqlitePool,
    settings: SettingsStore,
    provider: Arc<dyn FileSearchProvider>,
    page_size: i64,
    locks: ItemLocks,
}

impl SyncEngine {
    pub fn new(
        pool: SqlitePool,
        settings: SettingsStore,
        provider: Arc<dyn FileSearchProvider>,
        page_size: i64,
    ) -> Self {
        Self::with_locks(pool, settings, provider, page_size, ItemLocks::default())
    }

    pub fn with_locks(
        pool: SqlitePool,
        settings: SettingsStore,
        provider: Arc<dyn FileSearchProvider>,
        page_size: i64,
        locks: ItemLocks,
    ) -> Self {
        Self {
            pool,
            settings,
            provider,
            page_size,
            locks,
        }
    }

    /// Best-effort hook entry point: failures are reported to stderr and
    /// swallowed so they never block the CMS operation behind the event.
    pub async fn handle_event(&self, event: SyncEvent) {
        let result = match event {
            SyncEvent::Saved { item } => self.apply_saved(item).await,
            SyncEvent::Deleted { id } => self.apply_deleted(id).await,
        };
        if let Err(e) = result {
            eprintln!("sync: {}", e);
        }
    }

    async fn apply_saved(&self, item: ContentItem) -> Result<()> {
        // Autosaves/revisions never reach the state machine
        if item.is_transient() {
            return Ok(());
        }

        let lock = self.item_lock(item.id);
        let _guard = lock.lock().await;

        self.upsert_mirror(&item).await?;

        let indexable = self
            .settings
            .indexable_types()
            .await?
            .contains(&item.content_type);
        if !indexable {
            return Ok(());
        }

        if !item.is_published() {
            self.delete_remote(item.id).await?;
            return Ok(());
        }

        self.push_item(&item).await
    }

    async fn apply_deleted(&self, id: i64) -> Result<()> {
        let lock = self.item_lock(id);
        let _guard = lock.lock().await;

        self.delete_remote(id).await?;

        sqlx::query("DELETE FROM content_fts WHERE content_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM content_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete-old → transform → upload → record mapping.
    async fn push_item(&self, item: &ContentItem) -> Result<()> {
        self.delete_remote(item.id).await?;

        let document = transform::to_document(item);
        let document_name = self.provider.upload_document(&document, item.id).await?;

        let store_name = self.settings.store_name().await?.unwrap_or_default();
        sqlx::query(
            r#"
            INSERT INTO remote_documents (content_id, document_name, store_name)
            VALUES (?, ?, ?)
            ON CONFLICT(content_id) DO UPDATE SET
                document_name = excluded.document_name,
                store_name = excluded.store_name
            "#,
        )
        .bind(item.id)
        .bind(&document_name)
        .bind(&store_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete the remote document recorded for an item, if any, and clear
    /// the mapping. The mapping is cleared even when the remote delete
    /// fails.
    async fn delete_remote(&self, id: i64) -> Result<()> {
        let document_name: Option<String> =
            sqlx::query_scalar("SELECT document_name FROM remote_documents WHERE content_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(document_name) = document_name else {
            return Ok(());
        };

        if let Err(e) = self.provider.delete_document(&document_name).await {
            eprintln!("sync: delete of {} failed: {}", document_name, e);
        }

        sqlx::query("DELETE FROM remote_documents WHERE content_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Process one page of a bulk backfill over the published mirror.
    ///
    /// Per-item failures are counted and never abort the page; the report
    /// carries cumulative progress so a caller can drive the pagination
    /// loop page by page.
    pub async fn run_backfill(&self, page: i64) -> Result<BackfillReport> {
        if page < 1 {
            anyhow::bail!("page must be >= 1");
        }

        let types = self.settings.indexable_types().await?;
        if types.is_empty() {
            anyhow::bail!("no indexable types configured");
        }

        let placeholders = vec!["?"; types.len()].join(", ");

        let count_sql = format!(
            "SELECT COUNT(*) FROM content_items WHERE status = ? AND type IN ({})",
            placeholders
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(STATUS_PUBLISHED);
        for t in &types {
            count_query = count_query.bind(t);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let page_sql = format!(
            "SELECT id, type, status, title, url, body_html, updated_at \
             FROM content_items WHERE status = ? AND type IN ({}) \
             ORDER BY id LIMIT ? OFFSET ?",
            placeholders
        );
        let mut page_query = sqlx::query_as::<_, ContentRow>(&page_sql).bind(STATUS_PUBLISHED);
        for t in &types {
            page_query = page_query.bind(t);
        }
        let rows = page_query
            .bind(self.page_size)
            .bind((page - 1) * self.page_size)
            .fetch_all(&self.pool)
            .await?;

        let mut success = 0i64;
        let mut errors = 0i64;

        for row in &rows {
            let item = row.to_item();
            let lock = self.item_lock(item.id);
            let _guard = lock.lock().await;

            match self.push_item(&item).await {
                Ok(()) => success += 1,
                Err(e) => {
                    eprintln!("backfill: item {} failed: {}", item.id, e);
                    errors += 1;
                }
            }
        }

        // Clamped so a page request past the end can't report more items
        // processed than exist
        let processed = ((page - 1) * self.page_size + rows.len() as i64).min(total);
        let has_more = processed < total;

        Ok(BackfillReport {
            processed,
            total,
            success,
            errors,
            has_more,
            next_page: if has_more { Some(page + 1) } else { None },
        })
    }

    async fn upsert_mirror(&self, item: &ContentItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO content_items (id, type, status, title, url, body_html, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                type = excluded.type,
                status = excluded.status,
                title = excluded.title,
                url = excluded.url,
                body_html = excluded.body_html,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(item.id)
        .bind(&item.content_type)
        .bind(&item.status)
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.body_html)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        // FTS shadow: replace the row wholesale
        sqlx::query("DELETE FROM content_fts WHERE content_id = ?")
            .bind(item.id)
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO content_fts (content_id, title, body) VALUES (?, ?, ?)")
            .bind(item.id)
            .bind(&item.title)
            .bind(index_text(&item.body_html))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn item_lock(&self, id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks.entry(id).or_default().clone()
    }
}

/// Strip markup down to searchable text for the FTS shadow table.
fn index_text(html: &str) -> String {
    let stripped = transform::strip_noise(html);
    let tags = Regex::new(r"<[^>]+>").expect("static pattern");
    tags.replace_all(&stripped, " ").into_owned()
}

/// CLI entry point for `cbr backfill`. With `--all` the pagination loop
/// is driven to completion; otherwise one page is processed and the next
/// page number printed for resumption.
pub async fn run_backfill(config: &crate::config::Config, start_page: i64, all: bool) -> Result<()> {
    use crate::gemini::GeminiClient;

    let pool = crate::db::connect(config).await?;
    let settings = SettingsStore::new(pool.clone());
    let provider: Arc<dyn FileSearchProvider> =
        Arc::new(GeminiClient::from_settings(config, &settings).await?);
    let engine = SyncEngine::new(pool.clone(), settings, provider, config.sync.page_size);

    let mut page = start_page;
    loop {
        let report = engine.run_backfill(page).await?;
        println!("backfill page {}", page);
        println!("  processed: {}/{}", report.processed, report.total);
        println!("  success: {}  errors: {}", report.success, report.errors);

        if !report.has_more {
            break;
        }
        if !all {
            println!("  next page: {}", page + 1);
            break;
        }
        page = report.next_page.unwrap_or(page + 1);
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: i64,
    #[sqlx(rename = "type")]
    content_type: String,
    status: String,
    title: String,
    url: String,
    body_html: String,
    updated_at: i64,
}

impl ContentRow {
    fn to_item(&self) -> ContentItem {
        ContentItem {
            id: self.id,
            content_type: self.content_type.clone(),
            status: self.status.clone(),
            title: self.title.clone(),
            url: self.url.clone(),
            body_html: self.body_html.clone(),
            updated_at: self.updated_at,
        }
    }
}
