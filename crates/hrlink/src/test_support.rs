// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: scripted transports, a fake ERP server, stores.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::sync::broadcast;

use crate::credential::oauth::{REFRESH_METHOD, SIGN_IN_METHOD};
use crate::credential::store::{CredentialStore, MemoryStore};
use crate::credential::{SessionEvent, ACCESS_TOKEN_KEY, BASE_URL_KEY, REFRESH_TOKEN_KEY};
use crate::error::ClientError;
use crate::transport::{BoxFuture, Request, Response, Transport};

/// Base URL used by the fixtures.
pub const TEST_BASE_URL: &str = "https://erp.example.com";

type Handler = dyn Fn(&Request) -> Result<Response, ClientError> + Send + Sync;

/// Transport that records every request and answers from a closure.
///
/// With a delay, each send records the request, sleeps, then answers, so
/// concurrent callers overlap the way real network calls do. URLs containing
/// a `slow_when` pattern sleep for that pattern's delay instead.
pub struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<Request>>,
    delay: Duration,
    slow: Vec<(String, Duration)>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&Request) -> Result<Response, ClientError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            slow: Vec::new(),
        }
    }

    pub fn delay(mut self, d: Duration) -> Self {
        self.delay = d;
        self
    }

    pub fn slow_when(mut self, pattern: &str, d: Duration) -> Self {
        self.slow.push((pattern.to_owned(), d));
        self
    }

    fn delay_for(&self, request: &Request) -> Duration {
        self.slow
            .iter()
            .find(|(pattern, _)| request.url.contains(pattern.as_str()))
            .map_or(self.delay, |(_, d)| *d)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Number of recorded requests whose URL ends with `suffix`.
    pub fn count_ending_with(&self, suffix: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url.ends_with(suffix)).count()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        Box::pin(async move {
            self.requests.lock().push(request.clone());
            let delay = self.delay_for(&request);
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            (self.handler)(&request)
        })
    }
}

/// JSON response with the given status.
pub fn json_response(status: u16, body: serde_json::Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Response::new(status, body.to_string())
}

/// Body of a successful token method call.
pub fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({ "data": { "access_token": access, "refresh_token": refresh } })
}

/// How the fake ERP answers the refresh method.
#[derive(Debug, Clone)]
pub enum RefreshMode {
    /// Issue this access token (and `refresh-<n>` as refresh token).
    Issue(String),
    /// Answer with this status and an error body.
    Status(u16),
    /// 200 with no access token.
    Empty,
}

/// In-memory stand-in for the ERP's token and resource endpoints.
///
/// Resource calls succeed only with `Bearer <valid_token>`; anything else is
/// a 401. URLs containing `boom` answer 500.
pub struct FakeErp {
    valid_token: Mutex<String>,
    refresh_mode: Mutex<RefreshMode>,
    reject_all: AtomicBool,
    refresh_calls: AtomicU32,
    sign_in_calls: AtomicU32,
    resource_calls: AtomicU32,
}

impl FakeErp {
    pub fn new(valid_token: &str) -> Arc<Self> {
        Arc::new(Self {
            valid_token: Mutex::new(valid_token.to_owned()),
            refresh_mode: Mutex::new(RefreshMode::Issue("new-TOKEN".to_owned())),
            reject_all: AtomicBool::new(false),
            refresh_calls: AtomicU32::new(0),
            sign_in_calls: AtomicU32::new(0),
            resource_calls: AtomicU32::new(0),
        })
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock() = mode;
    }

    /// Answer 401 to every resource call, even with a valid token.
    pub fn reject_all(&self, on: bool) {
        self.reject_all.store(on, Ordering::Relaxed);
    }

    pub fn valid_token(&self) -> String {
        self.valid_token.lock().clone()
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::Relaxed)
    }

    pub fn sign_in_calls(&self) -> u32 {
        self.sign_in_calls.load(Ordering::Relaxed)
    }

    pub fn resource_calls(&self) -> u32 {
        self.resource_calls.load(Ordering::Relaxed)
    }

    pub fn handle(&self, request: &Request) -> Result<Response, ClientError> {
        let path = request.url.split('?').next().unwrap_or_default();
        if path.ends_with(REFRESH_METHOD) {
            let n = self.refresh_calls.fetch_add(1, Ordering::Relaxed) + 1;
            let mode = self.refresh_mode.lock().clone();
            return Ok(match mode {
                RefreshMode::Issue(token) => {
                    *self.valid_token.lock() = token.clone();
                    json_response(200, token_body(&token, &format!("refresh-{n}")))
                }
                RefreshMode::Status(status) => {
                    json_response(status, serde_json::json!({ "exc_type": "AuthenticationError" }))
                }
                RefreshMode::Empty => json_response(200, serde_json::json!({ "data": {} })),
            });
        }
        if path.ends_with(SIGN_IN_METHOD) {
            self.sign_in_calls.fetch_add(1, Ordering::Relaxed);
            *self.valid_token.lock() = "signed-in-access".to_owned();
            return Ok(json_response(
                200,
                serde_json::json!({
                    "data": {
                        "access_token": "signed-in-access",
                        "refresh_token": "signed-in-refresh",
                        "employee_id": "HR-EMP-0001",
                        "user_id": "emp@example.com"
                    }
                }),
            ));
        }

        self.resource_calls.fetch_add(1, Ordering::Relaxed);
        if path.contains("boom") {
            return Ok(json_response(500, serde_json::json!({ "exc": "boom" })));
        }
        let authorized = !self.reject_all.load(Ordering::Relaxed)
            && request.bearer() == Some(self.valid_token.lock().as_str());
        if authorized {
            Ok(json_response(200, serde_json::json!({ "data": { "path": path } })))
        } else {
            Ok(json_response(401, serde_json::json!({ "exc_type": "AuthenticationError" })))
        }
    }

    /// A transport answering from this fake.
    pub fn transport(self: &Arc<Self>) -> MockTransport {
        let erp = Arc::clone(self);
        MockTransport::new(move |req| erp.handle(req))
    }
}

/// Memory store pre-seeded with a base URL and token pair.
pub fn seeded_store(access: Option<&str>, refresh: Option<&str>) -> Arc<MemoryStore> {
    let mut entries = vec![(BASE_URL_KEY, TEST_BASE_URL.to_owned())];
    if let Some(access) = access {
        entries.push((ACCESS_TOKEN_KEY, access.to_owned()));
    }
    if let Some(refresh) = refresh {
        entries.push((REFRESH_TOKEN_KEY, refresh.to_owned()));
    }
    Arc::new(MemoryStore::with_entries(entries))
}

/// Store wrapper whose writes can be switched to fail.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Arc<Self> {
        Arc::new(Self { inner, fail_writes: AtomicBool::new(false) })
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            Err(ClientError::Store("disk full".into()))
        } else {
            Ok(())
        }
    }
}

impl CredentialStore for FlakyStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, ClientError>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, Result<(), ClientError>> {
        match self.check() {
            Ok(()) => self.inner.set(key, value),
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }

    fn set_many(&self, entries: Vec<(String, String)>) -> BoxFuture<'_, Result<(), ClientError>> {
        match self.check() {
            Ok(()) => self.inner.set_many(entries),
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<(), ClientError>> {
        match self.check() {
            Ok(()) => self.inner.remove(key),
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        match self.check() {
            Ok(()) => self.inner.clear(),
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }
}

/// Drain every event currently queued on a receiver.
pub fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}
