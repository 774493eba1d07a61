//! Gemini File Search client.
//!
//! Manages the lifecycle of the remote document store (create store,
//! upload document, delete document) and runs retrieval-grounded
//! generation over it. All calls carry the API key; uploads and deletes
//! use the query-parameter form the upload/delete endpoints expect, JSON
//! calls use the `x-goog-api-key` header.
//!
//! No automatic retries: sync callers treat failures as countable,
//! re-invokable events, and the admin-facing operations surface the
//! error as-is.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{Config, ProviderConfig};
use crate::credentials::Credentials;
use crate::models::{Answer, ChatMessage};
use crate::query;
use crate::settings::SettingsStore;

/// Provider-boundary error taxonomy.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing credential or store. Never retried; surfaced to callers
    /// with a fixed message carrying no internal detail.
    #[error("Configuration error")]
    Configuration,
    /// Network or timeout failure.
    #[error("request failed: {0}")]
    Transport(String),
    /// Non-success HTTP status or malformed payload from the provider.
    #[error("provider returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    /// 2xx response missing an expected field.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    /// Malformed input rejected before any remote call.
    #[error("{0}")]
    Validation(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

/// Seam between the sync orchestrator / query service and the hosted
/// provider. Mocked in orchestrator tests.
#[async_trait]
pub trait FileSearchProvider: Send + Sync {
    /// Create a new File Search store and return its opaque name.
    /// Persists nothing; the caller records the name on success.
    async fn create_store(&self, display_name: &str) -> Result<String, ProviderError>;

    /// Upload a markdown document, returning the remote document name.
    async fn upload_document(&self, content: &str, item_id: i64) -> Result<String, ProviderError>;

    /// Force-delete a remote document. Upstream absence is not an error.
    async fn delete_document(&self, document_name: &str) -> Result<(), ProviderError>;

    /// Run a retrieval-grounded conversation turn over the store.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<Answer, ProviderError>;
}

pub struct GeminiClient {
    api_key: String,
    store_name: Option<String>,
    model: String,
    provider: ProviderConfig,
}

impl GeminiClient {
    /// Build a client from persisted settings. An unconfigured credential
    /// or store is not an error here — individual operations fail with
    /// [`ProviderError::Configuration`] when they need what's missing.
    pub async fn from_settings(config: &Config, settings: &SettingsStore) -> anyhow::Result<Self> {
        let credentials = Credentials::new(settings.clone());
        let api_key = credentials.api_key().await?;
        let store_name = settings.store_name().await?;
        let models = query::model_list(&config.provider.extra_models);
        let model = settings.model(&models).await?;

        Ok(Self {
            api_key,
            store_name,
            model,
            provider: config.provider.clone(),
        })
    }

    #[cfg(test)]
    pub fn for_tests(api_key: &str, store_name: Option<&str>, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            store_name: store_name.map(|s| s.to_string()),
            model: model.to_string(),
            provider: ProviderConfig::default(),
        }
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::Configuration);
        }
        Ok(&self.api_key)
    }

    fn require_store(&self) -> Result<&str, ProviderError> {
        match self.store_name.as_deref() {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(ProviderError::Configuration),
        }
    }

    fn client(&self, timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(ProviderError::from)
    }

    /// JSON POST with the API key header; shared by store creation and
    /// generation.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ProviderError> {
        let api_key = self.require_key()?;
        let client = self.client(self.provider.generate_timeout_secs)?;

        let response = client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("not JSON: {}", e)))
    }
}

#[async_trait]
impl FileSearchProvider for GeminiClient {
    async fn create_store(&self, display_name: &str) -> Result<String, ProviderError> {
        // Timestamp suffix keeps repeated creations distinguishable upstream
        let body = serde_json::json!({
            "display_name": format!("{}-{}", display_name, chrono::Utc::now().timestamp()),
        });

        let url = format!("{}/fileSearchStores", self.provider.api_base);
        let result = self.post_json(&url, &body).await?;

        result
            .get("name")
            .and_then(|n| n.as_str())
            .map(|n| n.to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("missing store name".to_string()))
    }

    async fn upload_document(&self, content: &str, item_id: i64) -> Result<String, ProviderError> {
        let api_key = self.require_key()?;
        let store_name = self.require_store()?;

        let url = format!(
            "{}/{}:uploadToFileSearchStore?key={}",
            self.provider.upload_base, store_name, api_key
        );

        let boundary = Uuid::new_v4().simple().to_string();
        let metadata = serde_json::json!({
            "displayName": format!("{}.md", item_id),
            "mimeType": "text/markdown",
        });

        let mut body = String::new();
        body.push_str(&format!("--{}\r\n", boundary));
        body.push_str("Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.push_str(&format!("{}\r\n", metadata));
        body.push_str(&format!("--{}\r\n", boundary));
        body.push_str("Content-Type: text/markdown\r\n\r\n");
        body.push_str(&format!("{}\r\n", content));
        body.push_str(&format!("--{}--", boundary));

        let client = self.client(self.provider.upload_timeout_secs)?;
        let response = client
            .post(&url)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .header("X-Goog-Upload-Protocol", "multipart")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("not JSON: {}", e)))?;

        json.pointer("/response/documentName")
            .and_then(|d| d.as_str())
            .map(|d| d.to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("missing documentName".to_string()))
    }

    async fn delete_document(&self, document_name: &str) -> Result<(), ProviderError> {
        let api_key = self.require_key()?;

        // force=1 removes the document even if still referenced upstream.
        // Status is deliberately ignored: deleting an already-absent
        // document is success from the caller's perspective.
        let url = format!(
            "{}/{}?key={}&force=1",
            self.provider.api_base, document_name, api_key
        );

        let client = self.client(self.provider.delete_timeout_secs)?;
        client
            .delete(&url)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        Ok(())
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<Answer, ProviderError> {
        self.require_key()?;
        let store_name = self.require_store()?.to_string();

        if messages.is_empty() {
            return Err(ProviderError::Validation(
                "conversation must not be empty".to_string(),
            ));
        }

        let body = query::build_generate_body(
            messages,
            &store_name,
            &self.model,
            self.provider.system_instruction.as_deref(),
        );

        let url = format!(
            "{}/models/{}:generateContent",
            self.provider.api_base, self.model
        );
        let result = self.post_json(&url, &body).await?;

        let reply_text = result
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("empty reply".to_string()))?;

        Ok(query::parse_answer(reply_text, &self.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_requires_credential_and_store() {
        let no_key = GeminiClient::for_tests("", Some("fileSearchStores/s"), "gemini-2.5-flash");
        match no_key.upload_document("doc", 1).await {
            Err(ProviderError::Configuration) => {}
            other => panic!("expected configuration error, got {:?}", other.err()),
        }

        let no_store = GeminiClient::for_tests("key", None, "gemini-2.5-flash");
        match no_store.upload_document("doc", 1).await {
            Err(ProviderError::Configuration) => {}
            other => panic!("expected configuration error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_conversation_before_any_call() {
        let client =
            GeminiClient::for_tests("key", Some("fileSearchStores/s"), "gemini-2.5-flash");
        match client.generate(&[]).await {
            Err(ProviderError::Validation(msg)) => assert!(msg.contains("empty")),
            other => panic!("expected validation error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_configuration_error_message_is_fixed() {
        // Surfaced verbatim to untrusted callers; must carry no detail.
        assert_eq!(ProviderError::Configuration.to_string(), "Configuration error");
    }
}
