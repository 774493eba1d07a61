//! Administrative CLI commands: credential, store, model, and type
//! management, plus configuration status.
//!
//! These are the explicit, operator-triggered operations — unlike the
//! webhook sync path they surface errors instead of swallowing them.

use anyhow::Result;
use std::io::Read;

use crate::config::Config;
use crate::credentials::Credentials;
use crate::db;
use crate::gemini::{FileSearchProvider, GeminiClient};
use crate::query;
use crate::server::action_token;
use crate::settings::SettingsStore;

/// Token actions a front-end can request.
pub const TOKEN_ACTIONS: &[&str] = &["search", "chat", "events", "backfill"];

pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let settings = SettingsStore::new(pool.clone());
    let credentials = Credentials::new(settings.clone());

    let key_set = !credentials.api_key().await?.is_empty();
    let store = settings.store_name().await?;
    let models = query::model_list(&config.provider.extra_models);
    let model = settings.model(&models).await?;
    let types = settings.indexable_types().await?;

    let mirrored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_items")
        .fetch_one(&pool)
        .await?;
    let mapped: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM remote_documents")
        .fetch_one(&pool)
        .await?;

    println!("credential:      {}", if key_set { "SET" } else { "NOT SET" });
    println!(
        "store:           {}",
        store.as_deref().unwrap_or("NOT CREATED")
    );
    println!("model:           {}", model);
    println!(
        "indexable types: {}",
        if types.is_empty() {
            "(none)".to_string()
        } else {
            types.join(", ")
        }
    );
    println!("mirrored items:  {}", mirrored);
    println!("mapped items:    {}", mapped);

    pool.close().await;
    Ok(())
}

/// Save the provider API key (encrypted at rest). Reads from stdin when
/// no value is given so the key stays out of shell history.
pub async fn run_credential_set(config: &Config, value: Option<String>) -> Result<()> {
    let api_key = match value {
        Some(v) => v,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let pool = db::connect(config).await?;
    let credentials = Credentials::new(SettingsStore::new(pool.clone()));
    credentials.save_api_key(&api_key).await?;
    pool.close().await;

    println!("API key saved.");
    Ok(())
}

pub async fn run_credential_clear(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let credentials = Credentials::new(SettingsStore::new(pool.clone()));
    credentials.clear().await?;
    pool.close().await;

    println!("API key cleared.");
    Ok(())
}

/// Create the File Search store and persist its name.
///
/// Recreating an existing store orphans every document uploaded to the
/// old one (there is no cascade delete upstream), so replacement requires
/// `--force` and a follow-up backfill.
pub async fn run_store_create(config: &Config, name: &str, force: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let settings = SettingsStore::new(pool.clone());

    if settings.store_name().await?.is_some() && !force {
        anyhow::bail!(
            "a store is already configured; recreating it orphans all uploaded documents. \
             Pass --force to replace it, then run `cbr backfill --all`."
        );
    }

    let client = GeminiClient::from_settings(config, &settings).await?;
    let store_name = client.create_store(name).await?;
    settings.set_store_name(&store_name).await?;

    println!("Store created: {}", store_name);
    pool.close().await;
    Ok(())
}

pub async fn run_model_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let settings = SettingsStore::new(pool.clone());

    let models = query::model_list(&config.provider.extra_models);
    let selected = settings.model(&models).await?;

    for model in &models {
        let marker = if *model == selected { "*" } else { " " };
        println!("{} {}", marker, model);
    }

    pool.close().await;
    Ok(())
}

pub async fn run_model_set(config: &Config, model: &str) -> Result<()> {
    let models = query::model_list(&config.provider.extra_models);
    if !models.iter().any(|m| m == model) {
        anyhow::bail!(
            "unknown model: '{}'. Available: {}",
            model,
            models.join(", ")
        );
    }

    let pool = db::connect(config).await?;
    SettingsStore::new(pool.clone()).set_model(model).await?;
    pool.close().await;

    println!("Model set to {}.", model);
    Ok(())
}

pub async fn run_types_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let types = SettingsStore::new(pool.clone()).indexable_types().await?;
    pool.close().await;

    if types.is_empty() {
        println!("No indexable types configured.");
    } else {
        for t in types {
            println!("{}", t);
        }
    }
    Ok(())
}

/// Replace the indexable type set. Existing items are not re-synced;
/// run a backfill to realign the corpus.
pub async fn run_types_set(config: &Config, types: Vec<String>) -> Result<()> {
    let pool = db::connect(config).await?;
    SettingsStore::new(pool.clone())
        .set_indexable_types(&types)
        .await?;
    pool.close().await;

    println!("Indexable types: {}", types.join(", "));
    Ok(())
}

/// Print the request token for one action (embedded by the front-end).
pub fn run_token(config: &Config, action: &str) -> Result<()> {
    if !TOKEN_ACTIONS.contains(&action) {
        anyhow::bail!(
            "unknown action: '{}'. Available: {}",
            action,
            TOKEN_ACTIONS.join(", ")
        );
    }
    println!("{}", action_token(&config.server.secret, action));
    Ok(())
}
