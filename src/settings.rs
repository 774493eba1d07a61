//! Runtime-mutable configuration persisted in SQLite.
//!
//! Deployment-static values (bind address, provider URLs) live in the TOML
//! config; everything an administrator changes at runtime — the encrypted
//! credential, the selected store and model, the indexable type set — goes
//! through [`SettingsStore`]. Writes are last-write-wins with no
//! transaction boundary.

use anyhow::Result;
use sqlx::SqlitePool;

/// Setting keys. One value per key; absence means "not configured".
pub const KEY_ENCRYPTION_KEY: &str = "encryption_key";
pub const KEY_API_KEY_ENCRYPTED: &str = "api_key_encrypted";
pub const KEY_STORE_NAME: &str = "store_name";
pub const KEY_MODEL: &str = "model";
pub const KEY_INDEXABLE_TYPES: &str = "indexable_types";

#[derive(Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Selected File Search store, or `None` when not configured.
    pub async fn store_name(&self) -> Result<Option<String>> {
        self.get(KEY_STORE_NAME).await
    }

    pub async fn set_store_name(&self, name: &str) -> Result<()> {
        self.set(KEY_STORE_NAME, name).await
    }

    /// Selected model, falling back to the first entry of `models`.
    pub async fn model(&self, models: &[String]) -> Result<String> {
        match self.get(KEY_MODEL).await? {
            Some(m) if !m.is_empty() => Ok(m),
            _ => Ok(models.first().cloned().unwrap_or_default()),
        }
    }

    pub async fn set_model(&self, model: &str) -> Result<()> {
        self.set(KEY_MODEL, model).await
    }

    /// Content type tags eligible for sync. Mutating this set does not
    /// retroactively re-sync existing items.
    pub async fn indexable_types(&self) -> Result<Vec<String>> {
        match self.get(KEY_INDEXABLE_TYPES).await? {
            Some(json) => Ok(serde_json::from_str(&json).unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    pub async fn set_indexable_types(&self, types: &[String]) -> Result<()> {
        self.set(KEY_INDEXABLE_TYPES, &serde_json::to_string(types)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_set_get_roundtrip_and_overwrite() {
        let pool = db::connect_memory().await.unwrap();
        let settings = SettingsStore::new(pool);

        assert_eq!(settings.get(KEY_MODEL).await.unwrap(), None);
        settings.set(KEY_MODEL, "gemini-2.5-flash").await.unwrap();
        assert_eq!(
            settings.get(KEY_MODEL).await.unwrap().as_deref(),
            Some("gemini-2.5-flash")
        );
        settings.set(KEY_MODEL, "gemini-2.5-pro").await.unwrap();
        assert_eq!(
            settings.get(KEY_MODEL).await.unwrap().as_deref(),
            Some("gemini-2.5-pro")
        );
    }

    #[tokio::test]
    async fn test_model_defaults_to_first_entry() {
        let pool = db::connect_memory().await.unwrap();
        let settings = SettingsStore::new(pool);
        let models = vec!["a-model".to_string(), "b-model".to_string()];
        assert_eq!(settings.model(&models).await.unwrap(), "a-model");

        settings.set_model("b-model").await.unwrap();
        assert_eq!(settings.model(&models).await.unwrap(), "b-model");
    }

    #[tokio::test]
    async fn test_indexable_types_json_roundtrip() {
        let pool = db::connect_memory().await.unwrap();
        let settings = SettingsStore::new(pool);

        assert!(settings.indexable_types().await.unwrap().is_empty());
        settings
            .set_indexable_types(&["post".to_string(), "page".to_string()])
            .await
            .unwrap();
        assert_eq!(
            settings.indexable_types().await.unwrap(),
            vec!["post".to_string(), "page".to_string()]
        );
    }
}
