// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session context: token cache over the credential store, and teardown.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::base_url::clean_base_url;
use crate::credential::store::CredentialStore;
use crate::credential::{
    SessionEvent, TokenPair, ACCESS_TOKEN_KEY, BASE_URL_KEY, REFRESH_TOKEN_KEY,
};
use crate::error::ClientError;

/// In-process copy of the stored credentials.
///
/// `generation` is bumped on every explicit write so a store read that raced
/// with a save or clear never backfills a stale value. `cleared` pins the
/// tokens to empty after a clear, even if the store still holds them, until
/// the next save.
#[derive(Debug, Default)]
struct Cache {
    access: Option<String>,
    refresh: Option<String>,
    base_url: Option<String>,
    generation: u64,
    cleared: bool,
}

/// Owns the token cache, the credential store handle and the event channel.
///
/// One instance per signed-in application lifetime, shared by `Arc` between
/// the client and the refresh coordinator.
pub struct SessionContext {
    store: Arc<dyn CredentialStore>,
    cache: Mutex<Cache>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn CredentialStore>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        Arc::new(Self { store, cache: Mutex::new(Cache::default()), event_tx })
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    /// Current token pair: cache first, then the store per missing field.
    pub async fn load_tokens(&self) -> Result<TokenPair, ClientError> {
        let (access, refresh, generation) = {
            let cache = self.cache.lock();
            if cache.cleared {
                return Ok(TokenPair { access: cache.access.clone(), refresh: cache.refresh.clone() });
            }
            (cache.access.clone(), cache.refresh.clone(), cache.generation)
        };
        if access.is_some() && refresh.is_some() {
            return Ok(TokenPair { access, refresh });
        }

        let stored_access = match access {
            Some(_) => None,
            None => non_empty(self.store.get(ACCESS_TOKEN_KEY).await?),
        };
        let stored_refresh = match refresh {
            Some(_) => None,
            None => non_empty(self.store.get(REFRESH_TOKEN_KEY).await?),
        };

        let mut cache = self.cache.lock();
        if cache.generation == generation {
            if cache.access.is_none() {
                cache.access = stored_access;
            }
            if cache.refresh.is_none() {
                cache.refresh = stored_refresh;
            }
        }
        Ok(TokenPair { access: cache.access.clone(), refresh: cache.refresh.clone() })
    }

    /// Persist a new token pair, then update the cache.
    ///
    /// A `None` refresh token keeps the current one. On store failure the cache
    /// is left untouched and the error is returned.
    pub async fn save_tokens(&self, access: &str, refresh: Option<&str>) -> Result<(), ClientError> {
        let mut entries = vec![(ACCESS_TOKEN_KEY.to_owned(), access.to_owned())];
        if let Some(refresh) = refresh {
            entries.push((REFRESH_TOKEN_KEY.to_owned(), refresh.to_owned()));
        }
        self.store.set_many(entries).await?;

        let mut cache = self.cache.lock();
        cache.access = Some(access.to_owned());
        if let Some(refresh) = refresh {
            cache.refresh = Some(refresh.to_owned());
        }
        cache.generation += 1;
        cache.cleared = false;
        Ok(())
    }

    /// Install a new session's token pair.
    ///
    /// Unlike [`save_tokens`](Self::save_tokens), a missing refresh token drops
    /// the stored one rather than keeping the previous session's.
    pub async fn replace_tokens(
        &self,
        access: &str,
        refresh: Option<&str>,
    ) -> Result<(), ClientError> {
        if refresh.is_none() {
            self.store.remove(REFRESH_TOKEN_KEY).await?;
            let mut cache = self.cache.lock();
            cache.refresh = None;
            cache.generation += 1;
        }
        self.save_tokens(access, refresh).await
    }

    /// Drop both tokens from the cache and the store.
    ///
    /// The cache is cleared first and stays empty for this process even if
    /// removing the stored keys fails.
    pub async fn clear_tokens(&self) -> Result<(), ClientError> {
        {
            let mut cache = self.cache.lock();
            cache.access = None;
            cache.refresh = None;
            cache.generation += 1;
            cache.cleared = true;
        }
        let access = self.store.remove(ACCESS_TOKEN_KEY).await;
        let refresh = self.store.remove(REFRESH_TOKEN_KEY).await;
        access.and(refresh)?;
        debug!("session tokens cleared");
        Ok(())
    }

    /// Cleaned base URL, or `None` when nothing usable is stored.
    pub async fn base_url(&self) -> Result<Option<String>, ClientError> {
        let generation = {
            let cache = self.cache.lock();
            if let Some(ref url) = cache.base_url {
                return Ok(Some(url.clone()));
            }
            cache.generation
        };
        let stored = self.store.get(BASE_URL_KEY).await?.map(|raw| clean_base_url(&raw));
        let stored = stored.filter(|url| !url.is_empty());

        let mut cache = self.cache.lock();
        if cache.base_url.is_none() && cache.generation == generation {
            cache.base_url = stored;
        }
        Ok(cache.base_url.clone())
    }

    /// Clean and persist the server address. Returns the cleaned value.
    pub async fn set_base_url(&self, raw: &str) -> Result<String, ClientError> {
        let cleaned = clean_base_url(raw);
        if cleaned.is_empty() {
            return Err(ClientError::Precondition("missing base URL".into()));
        }
        self.store.set(BASE_URL_KEY, &cleaned).await?;
        let mut cache = self.cache.lock();
        cache.base_url = Some(cleaned.clone());
        cache.generation += 1;
        Ok(cleaned)
    }

    /// Clear credentials and tell the application the session is over.
    ///
    /// Store failures are logged; the cache is always cleared and the event is
    /// always emitted.
    pub async fn teardown(&self, reason: &str) {
        if let Err(e) = self.clear_tokens().await {
            warn!(err = %e, "failed to clear stored tokens during teardown");
        }
        info!(reason, "session torn down");
        self.emit(SessionEvent::Expired { reason: reason.to_owned() });
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
