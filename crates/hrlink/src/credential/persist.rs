// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed credential store: a JSON object written atomically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::credential::store::CredentialStore;
use crate::error::ClientError;
use crate::transport::BoxFuture;

/// Persisted key-value entries.
pub type PersistedEntries = BTreeMap<String, String>;

/// Load persisted entries from a JSON file. A missing file is an empty store.
pub fn load(path: &Path) -> anyhow::Result<PersistedEntries> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PersistedEntries::new()),
        Err(e) => return Err(e.into()),
    };
    if contents.trim().is_empty() {
        return Ok(PersistedEntries::new());
    }
    let entries: PersistedEntries = serde_json::from_str(&contents)?;
    Ok(entries)
}

/// Save entries to a JSON file atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves never
/// share a `.tmp` file.
pub fn save(path: &Path, entries: &PersistedEntries) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let json = serde_json::to_string_pretty(entries)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Credential store persisted to a single JSON file.
///
/// The file is read on first access. Every write goes to disk before the
/// in-memory copy is updated, so a failed write leaves both unchanged.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Option<PersistedEntries>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), entries: Mutex::new(None) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `edit` to a copy of the entries, persist it, then commit.
    async fn update(
        &self,
        edit: impl FnOnce(&mut PersistedEntries),
    ) -> Result<(), ClientError> {
        let mut guard = self.entries.lock().await;
        let mut next = match guard.as_ref() {
            Some(entries) => entries.clone(),
            None => self.load_blocking().await?,
        };
        edit(&mut next);
        let path = self.path.clone();
        let next = blocking(move || save(&path, &next).map(|()| next)).await?;
        *guard = Some(next);
        Ok(())
    }

    async fn load_blocking(&self) -> Result<PersistedEntries, ClientError> {
        let path = self.path.clone();
        blocking(move || load(&path)).await
    }
}

/// Run file I/O on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ClientError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ClientError::Store(format!("store task failed: {e}")))?
        .map_err(store_err)
}

fn store_err(e: anyhow::Error) -> ClientError {
    ClientError::Store(format!("{e:#}"))
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, ClientError>> {
        let key = key.to_owned();
        Box::pin(async move {
            let mut guard = self.entries.lock().await;
            if guard.is_none() {
                *guard = Some(self.load_blocking().await?);
            }
            Ok(guard.as_ref().and_then(|entries| entries.get(&key).cloned()))
        })
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, Result<(), ClientError>> {
        let (key, value) = (key.to_owned(), value.to_owned());
        Box::pin(async move {
            self.update(|entries| {
                entries.insert(key, value);
            })
            .await
        })
    }

    fn set_many(&self, entries: Vec<(String, String)>) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move { self.update(|current| current.extend(entries)).await })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<(), ClientError>> {
        let key = key.to_owned();
        Box::pin(async move {
            self.update(|entries| {
                entries.remove(&key);
            })
            .await
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move { self.update(PersistedEntries::clear).await })
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
