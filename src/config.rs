use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Shared secret used to derive per-action request tokens.
    pub secret: String,
}

/// Gemini File Search endpoints and timeouts.
///
/// The base URLs are overridable so tests (and self-hosted proxies) can
/// point the client elsewhere.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
    /// Document bodies can be large; uploads get a generous ceiling.
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
    #[serde(default = "default_delete_timeout")]
    pub delete_timeout_secs: u64,
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_secs: u64,
    /// Overrides the built-in retrieval system instruction when set.
    #[serde(default)]
    pub system_instruction: Option<String>,
    /// Extends the built-in model list (selectable via `cbr model set`).
    #[serde(default)]
    pub extra_models: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            upload_base: default_upload_base(),
            upload_timeout_secs: default_upload_timeout(),
            delete_timeout_secs: default_delete_timeout(),
            generate_timeout_secs: default_generate_timeout(),
            system_instruction: None,
            extra_models: Vec::new(),
        }
    }
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_upload_base() -> String {
    "https://generativelanguage.googleapis.com/upload/v1beta".to_string()
}
fn default_upload_timeout() -> u64 {
    120
}
fn default_delete_timeout() -> u64 {
    30
}
fn default_generate_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> i64 {
    10
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.server.secret.trim().is_empty() {
        anyhow::bail!("server.secret must not be empty");
    }

    if config.sync.page_size < 1 {
        anyhow::bail!("sync.page_size must be >= 1");
    }

    if config.provider.upload_timeout_secs == 0 || config.provider.generate_timeout_secs == 0 {
        anyhow::bail!("provider timeouts must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cbr.toml");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config_with_defaults() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/cbr.sqlite"

[server]
bind = "127.0.0.1:7600"
secret = "s3cret"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.sync.page_size, 10);
        assert_eq!(cfg.provider.upload_timeout_secs, 120);
        assert_eq!(cfg.provider.delete_timeout_secs, 30);
        assert!(cfg.provider.api_base.contains("generativelanguage"));
        assert!(cfg.provider.system_instruction.is_none());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/cbr.sqlite"

[server]
bind = "127.0.0.1:7600"
secret = "  "
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_bad_page_size_rejected() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "data/cbr.sqlite"

[server]
bind = "127.0.0.1:7600"
secret = "s3cret"

[sync]
page_size = 0
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
