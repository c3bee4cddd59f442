//! The single persisted setting: the user's Gemini API key.
//!
//! Stored as one line in a small file so it survives restarts. Read once at
//! startup, rewritten whenever the settings form is submitted. Writing an
//! empty key clears it.

use std::{path::PathBuf, sync::Arc};

use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::error::AppError;

#[derive(Clone)]
pub struct KeyStore {
  path: Option<PathBuf>,
  key: Arc<RwLock<String>>,
}

impl KeyStore {
  /// Resolve the key file (API_KEY_FILE, else `<config dir>/mrsdung/gemini_api_key`)
  /// and load it. GEMINI_API_KEY is used when the file is missing or empty.
  pub fn from_env() -> Self {
    let path = std::env::var("API_KEY_FILE")
      .ok()
      .map(PathBuf::from)
      .or_else(|| dirs::config_dir().map(|d| d.join("mrsdung").join("gemini_api_key")));
    Self::load(path, std::env::var("GEMINI_API_KEY").ok())
  }

  pub fn load(path: Option<PathBuf>, fallback: Option<String>) -> Self {
    let from_file = path
      .as_ref()
      .and_then(|p| std::fs::read_to_string(p).ok())
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty());

    let key = match (from_file, fallback.map(|s| s.trim().to_string())) {
      (Some(k), _) => {
        info!(target: "mrsdung_backend", "Gemini API key loaded from key file");
        k
      }
      (None, Some(k)) if !k.is_empty() => {
        info!(target: "mrsdung_backend", "Gemini API key taken from GEMINI_API_KEY");
        k
      }
      _ => {
        warn!(target: "mrsdung_backend", "No Gemini API key configured; generation is blocked until one is saved");
        String::new()
      }
    };

    Self { path, key: Arc::new(RwLock::new(key)) }
  }

  pub async fn get(&self) -> Option<String> {
    let k = self.key.read().await;
    if k.is_empty() { None } else { Some(k.clone()) }
  }

  /// The key, or `MissingApiKey` when none is stored.
  pub async fn require(&self) -> Result<String, AppError> {
    self.get().await.ok_or(AppError::MissingApiKey)
  }

  pub async fn is_set(&self) -> bool {
    !self.key.read().await.is_empty()
  }

  /// Persist a new key (trimmed). An empty value clears the stored key.
  #[instrument(level = "info", skip(self, key), fields(key_len = key.trim().len()))]
  pub async fn set(&self, key: &str) -> Result<(), AppError> {
    let clean = key.trim().to_string();
    if let Some(path) = &self.path {
      if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
      }
      tokio::fs::write(path, &clean).await?;
    }
    *self.key.write().await = clean;
    info!(target: "mrsdung_backend", "Gemini API key updated");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn saved_key_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("key");

    let store = KeyStore::load(Some(path.clone()), None);
    assert_eq!(store.require().await, Err(AppError::MissingApiKey));

    store.set("  AIza-test-key \n").await.unwrap();
    assert_eq!(store.get().await.as_deref(), Some("AIza-test-key"));

    let reloaded = KeyStore::load(Some(path), None);
    assert_eq!(reloaded.require().await.unwrap(), "AIza-test-key");
  }

  #[tokio::test]
  async fn empty_key_clears() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("key");
    let store = KeyStore::load(Some(path.clone()), Some("from-env".into()));
    assert!(store.is_set().await);

    store.set("").await.unwrap();
    assert!(!store.is_set().await);
    assert_eq!(std::fs::read_to_string(path).unwrap(), "");
  }

  #[tokio::test]
  async fn key_file_wins_over_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("key");
    std::fs::write(&path, "file-key").unwrap();
    let store = KeyStore::load(Some(path), Some("env-key".into()));
    assert_eq!(store.get().await.as_deref(), Some("file-key"));
  }
}
