// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async key-value credential store seam.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::ClientError;
use crate::transport::BoxFuture;

/// Durable key-value storage for credentials and the server address.
///
/// Object-safe for use as `Arc<dyn CredentialStore>`.
pub trait CredentialStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, ClientError>>;

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, Result<(), ClientError>>;

    /// Write several entries; either all are persisted or an error is returned.
    fn set_many(&self, entries: Vec<(String, String)>) -> BoxFuture<'_, Result<(), ClientError>>;

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<(), ClientError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), ClientError>>;
}

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { entries: RwLock::new(entries) }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, ClientError>> {
        let key = key.to_owned();
        Box::pin(async move { Ok(self.entries.read().await.get(&key).cloned()) })
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, Result<(), ClientError>> {
        let (key, value) = (key.to_owned(), value.to_owned());
        Box::pin(async move {
            self.entries.write().await.insert(key, value);
            Ok(())
        })
    }

    fn set_many(&self, entries: Vec<(String, String)>) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.entries.write().await.extend(entries);
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<(), ClientError>> {
        let key = key.to_owned();
        Box::pin(async move {
            self.entries.write().await.remove(&key);
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.entries.write().await.clear();
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
