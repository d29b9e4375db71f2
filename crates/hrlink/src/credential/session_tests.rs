// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::credential::store::MemoryStore;
use crate::test_support::{drain_events, seeded_store, FlakyStore, TEST_BASE_URL};

#[tokio::test]
async fn cold_start_reads_store_and_backfills_cache() -> anyhow::Result<()> {
    let store = seeded_store(Some("a1"), Some("r1"));
    let session = SessionContext::new(store.clone());

    let tokens = session.load_tokens().await?;
    assert_eq!(tokens, TokenPair { access: Some("a1".into()), refresh: Some("r1".into()) });

    // Cache is now authoritative: a store change behind our back is not seen.
    store.set(ACCESS_TOKEN_KEY, "rewritten-elsewhere").await?;
    assert_eq!(session.load_tokens().await?.access.as_deref(), Some("a1"));
    Ok(())
}

#[tokio::test]
async fn empty_store_yields_empty_pair() -> anyhow::Result<()> {
    let session = SessionContext::new(Arc::new(MemoryStore::new()));
    assert_eq!(session.load_tokens().await?, TokenPair::default());
    assert_eq!(session.base_url().await?, None);
    Ok(())
}

#[tokio::test]
async fn save_writes_store_and_cache() -> anyhow::Result<()> {
    let store = seeded_store(Some("a1"), Some("r1"));
    let session = SessionContext::new(store.clone());

    session.save_tokens("a2", Some("r2")).await?;
    assert_eq!(store.get(ACCESS_TOKEN_KEY).await?.as_deref(), Some("a2"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).await?.as_deref(), Some("r2"));
    assert_eq!(
        session.load_tokens().await?,
        TokenPair { access: Some("a2".into()), refresh: Some("r2".into()) }
    );
    Ok(())
}

#[tokio::test]
async fn save_without_refresh_keeps_current_refresh() -> anyhow::Result<()> {
    let store = seeded_store(Some("a1"), Some("r1"));
    let session = SessionContext::new(store.clone());

    session.save_tokens("a2", None).await?;
    let tokens = session.load_tokens().await?;
    assert_eq!(tokens.access.as_deref(), Some("a2"));
    assert_eq!(tokens.refresh.as_deref(), Some("r1"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).await?.as_deref(), Some("r1"));
    Ok(())
}

#[tokio::test]
async fn failed_save_leaves_cache_untouched() -> anyhow::Result<()> {
    let store = FlakyStore::new(MemoryStore::with_entries([
        (ACCESS_TOKEN_KEY, "a1"),
        (REFRESH_TOKEN_KEY, "r1"),
    ]));
    let session = SessionContext::new(store.clone());
    session.load_tokens().await?;

    store.fail_writes(true);
    let err = session.save_tokens("a2", Some("r2")).await.err();
    assert!(matches!(err, Some(ClientError::Store(_))), "got {err:?}");
    assert_eq!(session.load_tokens().await?.access.as_deref(), Some("a1"));
    Ok(())
}

#[tokio::test]
async fn clear_removes_tokens_but_keeps_base_url() -> anyhow::Result<()> {
    let store = seeded_store(Some("a1"), Some("r1"));
    let session = SessionContext::new(store.clone());
    session.load_tokens().await?;

    session.clear_tokens().await?;
    assert_eq!(session.load_tokens().await?, TokenPair::default());
    assert_eq!(store.get(ACCESS_TOKEN_KEY).await?, None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).await?, None);
    assert_eq!(session.base_url().await?.as_deref(), Some(TEST_BASE_URL));
    Ok(())
}

#[tokio::test]
async fn base_url_is_cleaned_on_read_and_write() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::with_entries([(BASE_URL_KEY, " https://erp.example.com// ")]));
    let session = SessionContext::new(store.clone());
    assert_eq!(session.base_url().await?.as_deref(), Some("https://erp.example.com"));

    let cleaned = session.set_base_url("https://other.example.com/\u{200B}").await?;
    assert_eq!(cleaned, "https://other.example.com");
    assert_eq!(store.get(BASE_URL_KEY).await?.as_deref(), Some("https://other.example.com"));
    assert_eq!(session.base_url().await?.as_deref(), Some("https://other.example.com"));
    Ok(())
}

#[tokio::test]
async fn blank_base_url_is_rejected() {
    let session = SessionContext::new(Arc::new(MemoryStore::new()));
    let err = session.set_base_url("  //  ").await.err();
    assert!(matches!(err, Some(ClientError::Precondition(_))), "got {err:?}");
}

#[tokio::test]
async fn teardown_clears_and_emits_expired() -> anyhow::Result<()> {
    let session = SessionContext::new(seeded_store(Some("a1"), Some("r1")));
    let mut rx = session.subscribe();

    session.teardown("refresh token rejected").await;

    assert_eq!(session.load_tokens().await?, TokenPair::default());
    assert_eq!(
        drain_events(&mut rx),
        vec![SessionEvent::Expired { reason: "refresh token rejected".into() }]
    );
    Ok(())
}

#[tokio::test]
async fn teardown_still_emits_when_store_fails() -> anyhow::Result<()> {
    let store = FlakyStore::new(MemoryStore::with_entries([
        (ACCESS_TOKEN_KEY, "a1"),
        (REFRESH_TOKEN_KEY, "r1"),
    ]));
    let session = SessionContext::new(store.clone());
    let mut rx = session.subscribe();
    store.fail_writes(true);

    session.teardown("too many failed refresh attempts").await;

    assert_eq!(drain_events(&mut rx).len(), 1);
    // The stale pair is still on disk but must not come back.
    assert_eq!(store.get(REFRESH_TOKEN_KEY).await?.as_deref(), Some("r1"));
    assert_eq!(session.load_tokens().await?, TokenPair::default());
    Ok(())
}

#[tokio::test]
async fn failed_clear_is_reported_but_cache_stays_empty() -> anyhow::Result<()> {
    let store = FlakyStore::new(MemoryStore::with_entries([
        (ACCESS_TOKEN_KEY, "a1"),
        (REFRESH_TOKEN_KEY, "r1"),
    ]));
    let session = SessionContext::new(store.clone());
    session.load_tokens().await?;
    store.fail_writes(true);

    let err = session.clear_tokens().await.err();
    assert!(matches!(err, Some(ClientError::Store(_))), "got {err:?}");
    assert_eq!(session.load_tokens().await?, TokenPair::default());

    store.fail_writes(false);
    session.save_tokens("a2", Some("r2")).await?;
    assert_eq!(
        session.load_tokens().await?,
        TokenPair { access: Some("a2".into()), refresh: Some("r2".into()) }
    );
    Ok(())
}

#[tokio::test]
async fn replace_without_refresh_drops_previous_refresh() -> anyhow::Result<()> {
    let store = seeded_store(Some("acc-A"), Some("refresh-A"));
    let session = SessionContext::new(store.clone());
    session.load_tokens().await?;

    session.replace_tokens("acc-B", None).await?;

    assert_eq!(
        session.load_tokens().await?,
        TokenPair { access: Some("acc-B".into()), refresh: None }
    );
    assert_eq!(store.get(REFRESH_TOKEN_KEY).await?, None);
    assert_eq!(store.get(ACCESS_TOKEN_KEY).await?.as_deref(), Some("acc-B"));
    Ok(())
}

#[tokio::test]
async fn replace_with_refresh_writes_both() -> anyhow::Result<()> {
    let store = seeded_store(Some("acc-A"), Some("refresh-A"));
    let session = SessionContext::new(store.clone());

    session.replace_tokens("acc-B", Some("refresh-B")).await?;

    assert_eq!(store.get(REFRESH_TOKEN_KEY).await?.as_deref(), Some("refresh-B"));
    assert_eq!(session.load_tokens().await?.refresh.as_deref(), Some("refresh-B"));
    Ok(())
}
