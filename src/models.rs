//! Core data models used throughout Corpus Bridge.
//!
//! These types represent the content items, sync events, and answers that
//! flow between the CMS webhook boundary, the local mirror, and the
//! Gemini File Search provider.

use serde::{Deserialize, Serialize};

/// Content lifecycle status that makes an item eligible for indexing.
pub const STATUS_PUBLISHED: &str = "publish";
/// Transient status produced by editors before the first real save.
pub const STATUS_AUTO_DRAFT: &str = "auto-draft";

/// A unit of publishable content owned by the external CMS.
///
/// The CMS pushes the rendered body (shortcodes and embeds already
/// executed); Corpus Bridge never renders content itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    /// Type tag (e.g. `post`, `page`); only configured types are indexed.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Lifecycle status (`publish`, `draft`, `auto-draft`, ...).
    pub status: String,
    pub title: String,
    /// Canonical URL of the published item.
    pub url: String,
    /// Rendered HTML body.
    pub body_html: String,
    #[serde(default)]
    pub updated_at: i64,
}

impl ContentItem {
    pub fn is_published(&self) -> bool {
        self.status == STATUS_PUBLISHED
    }

    /// Autosaves, revisions, and auto-drafts never reach the sync state
    /// machine.
    pub fn is_transient(&self) -> bool {
        self.status == STATUS_AUTO_DRAFT
    }
}

/// Content lifecycle event dispatched to the sync orchestrator.
///
/// Decouples the orchestrator from the CMS hook mechanics: the webhook
/// handler and the `cbr ingest` command both produce these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum SyncEvent {
    Saved { item: ContentItem },
    Deleted { id: i64 },
}

/// One conversation turn. Roles other than `user`/`model` are coerced to
/// `user` at the request boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            content: content.into(),
        }
    }

    /// Coerce unknown roles to `user`, keeping `user` and `model` as-is.
    pub fn coerced(role: &str, content: &str) -> Self {
        let role = match role {
            "user" | "model" => role,
            _ => "user",
        };
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// A source citation attached to an answer (or an autocomplete hit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
}

/// Result of a conversational query: answer text (HTML-safe after
/// sanitization) plus zero or more source citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Answer {
    /// Wrap a raw provider reply with no citations.
    pub fn text_only(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }
}

/// Progress report for one page of a bulk backfill run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Items processed so far, including earlier pages.
    pub processed: i64,
    /// Total published items of indexable types.
    pub total: i64,
    /// Successful uploads on this page.
    pub success: i64,
    /// Failed items on this page (counted, never aborting the page).
    pub errors: i64,
    pub has_more: bool,
    pub next_page: Option<i64>,
}
