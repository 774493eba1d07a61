//! Encrypted-at-rest storage for the provider API key.
//!
//! AES-256-GCM with a random nonce per encryption; the key is generated
//! once and persisted in settings. Ciphertext layout is
//! `base64(nonce || ciphertext)`. Decryption of absent, undersized, or
//! corrupt input yields an empty string — callers treat empty as "not
//! configured", never as an error.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::settings::{SettingsStore, KEY_API_KEY_ENCRYPTED, KEY_ENCRYPTION_KEY};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct Credentials {
    settings: SettingsStore,
}

impl Credentials {
    pub fn new(settings: SettingsStore) -> Self {
        Self { settings }
    }

    /// Encrypt and persist the API key. Empty or whitespace-only input
    /// fails without touching stored state.
    pub async fn save_api_key(&self, api_key: &str) -> Result<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            anyhow::bail!("API key must not be empty");
        }
        let encrypted = self.encrypt(api_key).await?;
        self.settings.set(KEY_API_KEY_ENCRYPTED, &encrypted).await
    }

    /// Decrypted API key, or empty string when not configured (or when the
    /// stored ciphertext is unreadable).
    pub async fn api_key(&self) -> Result<String> {
        match self.settings.get(KEY_API_KEY_ENCRYPTED).await? {
            Some(encrypted) => self.decrypt(&encrypted).await,
            None => Ok(String::new()),
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.settings.delete(KEY_API_KEY_ENCRYPTED).await
    }

    async fn encrypt(&self, data: &str) -> Result<String> {
        let key_bytes = self.load_or_create_key().await?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, data.as_bytes())
            .map_err(|_| anyhow::anyhow!("encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    async fn decrypt(&self, encoded: &str) -> Result<String> {
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let decoded = match STANDARD.decode(encoded) {
            Ok(d) => d,
            Err(_) => return Ok(String::new()),
        };
        if decoded.len() < NONCE_LEN {
            return Ok(String::new());
        }

        let key_bytes = match self.settings.get(KEY_ENCRYPTION_KEY).await? {
            Some(b64) => match STANDARD.decode(&b64) {
                Ok(k) if k.len() == KEY_LEN => k,
                _ => return Ok(String::new()),
            },
            None => return Ok(String::new()),
        };

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        let (nonce, ciphertext) = decoded.split_at(NONCE_LEN);

        match cipher.decrypt(Nonce::from_slice(nonce), ciphertext) {
            Ok(plaintext) => Ok(String::from_utf8(plaintext).unwrap_or_default()),
            Err(_) => Ok(String::new()),
        }
    }

    async fn load_or_create_key(&self) -> Result<Vec<u8>> {
        if let Some(b64) = self.settings.get(KEY_ENCRYPTION_KEY).await? {
            if let Ok(key) = STANDARD.decode(&b64) {
                if key.len() == KEY_LEN {
                    return Ok(key);
                }
            }
        }

        let key = Aes256Gcm::generate_key(&mut OsRng);
        self.settings
            .set(KEY_ENCRYPTION_KEY, &STANDARD.encode(key))
            .await?;
        Ok(key.to_vec())
    }
}
