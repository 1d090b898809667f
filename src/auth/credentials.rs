//! Durable key/value storage for the bearer credential and host override.
//!
//! The store persists a small JSON map to disk so the credential survives
//! process restarts. Every operation is asynchronous and may fail with a
//! `StoreError`; callers decide whether a failure is fatal (it usually is
//! not - the session layer treats a failed read as "absent").

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Store file name inside the data directory
const STORE_FILE: &str = "credentials.json";

/// Persisted key for the bearer token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Persisted key for the API host override
pub const HOST_KEY: &str = "host";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed store file: {0}")]
    Malformed(#[from] serde_json::Error),
}

enum Backend {
    File(PathBuf),
    /// Test/in-process backend, no persistence
    Memory(Mutex<HashMap<String, String>>),
}

pub struct CredentialStore {
    backend: Backend,
}

impl CredentialStore {
    /// Open a file-backed store rooted at the given directory.
    /// The file is created lazily on first write.
    pub fn open(store_dir: PathBuf) -> Self {
        Self {
            backend: Backend::File(store_dir.join(STORE_FILE)),
        }
    }

    /// In-memory store that forgets everything on drop.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(HashMap::new())),
        }
    }

    /// Look up a value; `Ok(None)` means the key is absent.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match &self.backend {
            Backend::File(path) => {
                let map = read_map(path).await?;
                Ok(map.get(key).cloned())
            }
            Backend::Memory(map) => Ok(map.lock().await.get(key).cloned()),
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match &self.backend {
            Backend::File(path) => {
                let mut map = read_map(path).await?;
                map.insert(key.to_string(), value.to_string());
                write_map(path, &map).await
            }
            Backend::Memory(map) => {
                map.lock().await.insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    /// Remove a key. Removing an absent key is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match &self.backend {
            Backend::File(path) => {
                let mut map = read_map(path).await?;
                if map.remove(key).is_some() {
                    write_map(path, &map).await?;
                }
                Ok(())
            }
            Backend::Memory(map) => {
                map.lock().await.remove(key);
                Ok(())
            }
        }
    }

    // ===== Typed accessors for the well-known keys =====

    pub async fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.get(ACCESS_TOKEN_KEY).await
    }

    pub async fn set_access_token(&self, token: &str) -> Result<(), StoreError> {
        self.set(ACCESS_TOKEN_KEY, token).await
    }

    pub async fn clear_access_token(&self) -> Result<(), StoreError> {
        self.remove(ACCESS_TOKEN_KEY).await
    }

    pub async fn host_override(&self) -> Result<Option<String>, StoreError> {
        self.get(HOST_KEY).await
    }

    pub async fn set_host_override(&self, host: &str) -> Result<(), StoreError> {
        self.set(HOST_KEY, host).await
    }

    pub async fn clear_host_override(&self) -> Result<(), StoreError> {
        self.remove(HOST_KEY).await
    }
}

async fn read_map(path: &Path) -> Result<HashMap<String, String>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_map(path: &Path, map: &HashMap<String, String>) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = serde_json::to_string_pretty(map)?;
    tokio::fs::write(path, contents).await?;
    debug!(path = %path.display(), "credential store written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let store = CredentialStore::in_memory();
        assert!(store.get(ACCESS_TOKEN_KEY).await.unwrap().is_none());

        store.set(ACCESS_TOKEN_KEY, "tok123").await.unwrap();
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(),
            Some("tok123")
        );

        store.remove(ACCESS_TOKEN_KEY).await.unwrap();
        assert!(store.get(ACCESS_TOKEN_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_absent_key_is_ok() {
        let store = CredentialStore::in_memory();
        store.remove("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = CredentialStore::open(dir.path().to_path_buf());
        store.set_access_token("tok123").await.unwrap();
        store.set_host_override("http://10.0.0.5:3000").await.unwrap();
        drop(store);

        let reopened = CredentialStore::open(dir.path().to_path_buf());
        assert_eq!(
            reopened.access_token().await.unwrap().as_deref(),
            Some("tok123")
        );
        assert_eq!(
            reopened.host_override().await.unwrap().as_deref(),
            Some("http://10.0.0.5:3000")
        );

        reopened.clear_access_token().await.unwrap();
        assert!(reopened.access_token().await.unwrap().is_none());
        // Other keys survive a removal
        assert!(reopened.host_override().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("deep").join("nested"));
        assert!(store.get("anything").await.unwrap().is_none());
    }
}
