// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access token refresh.
//!
//! At most one refresh call is in flight per session. The first request to hit
//! an auth failure starts it; every request arriving while it runs awaits a
//! clone of the same shared future and receives the same token or error.

use std::sync::Arc;

use futures_util::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::base_url::method_url;
use crate::credential::oauth::{decode_tokens, TokenData, REFRESH_METHOD};
use crate::credential::session::SessionContext;
use crate::credential::SessionEvent;
use crate::error::ClientError;
use crate::transport::gate::{self, Verdict};
use crate::transport::{BoxFuture, Request, Transport};

/// Consecutive failed refreshes before the session is torn down.
pub const DEFAULT_MAX_FAILURES: u32 = 3;

/// Reason reported when the failure threshold is reached.
pub const TOO_MANY_FAILURES: &str = "too many failed refresh attempts";

/// Reason reported when the refresh endpoint rejects the refresh token.
pub const REFRESH_REJECTED: &str = "refresh token rejected";

/// Outcome of a refresh, shared by every waiter.
pub type SharedRefresh = Shared<BoxFuture<'static, Result<String, ClientError>>>;

/// Perform a single refresh call against `{base_url}/api/method/...create_refresh_token`.
///
/// A 401/403 from the endpoint is `SessionExpired`; any other non-2xx, an
/// unreachable server, or a body without an access token is `Refresh`.
pub async fn do_refresh(
    transport: &dyn Transport,
    base_url: &str,
    refresh_token: &str,
) -> Result<TokenData, ClientError> {
    let request =
        Request::post(method_url(base_url, REFRESH_METHOD)).form(&[("refresh_token", refresh_token)]);
    let resp = transport
        .send(request.clone())
        .await
        .map_err(|e| ClientError::Refresh(e.to_string()))?;

    if gate::inspect(&request, resp.status) == Verdict::Expire {
        return Err(ClientError::SessionExpired(format!("{REFRESH_REJECTED} ({})", resp.status)));
    }
    if !resp.is_success() {
        return Err(ClientError::Refresh(format!("refresh failed ({}): {}", resp.status, resp.text())));
    }

    let data = decode_tokens(&resp.body).map_err(|e| ClientError::Refresh(e.to_string()))?;
    if data.access().is_none() {
        return Err(ClientError::Refresh("refresh returned empty token".into()));
    }
    Ok(data)
}

/// Mutable refresh bookkeeping. Only touched inside short critical sections
/// that never span an `.await`.
#[derive(Default)]
struct RefreshState {
    in_flight: Option<SharedRefresh>,
    consecutive_failures: u32,
}

struct Inner {
    session: Arc<SessionContext>,
    transport: Arc<dyn Transport>,
    max_failures: u32,
    state: Mutex<RefreshState>,
}

/// Single-flight refresh controller with a consecutive-failure threshold.
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        session: Arc<SessionContext>,
        transport: Arc<dyn Transport>,
        max_failures: u32,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                transport,
                max_failures: max_failures.max(1),
                state: Mutex::new(RefreshState::default()),
            }),
        }
    }

    /// Start a refresh, or join the one already running.
    ///
    /// Synchronous: the in-flight check and the installation of the new shared
    /// future happen under one lock with no suspension point in between.
    pub fn request_refresh(&self) -> SharedRefresh {
        let mut state = self.inner.state.lock();
        if let Some(ref in_flight) = state.in_flight {
            debug!("joining in-flight token refresh");
            return in_flight.clone();
        }
        let refresh: BoxFuture<'static, Result<String, ClientError>> =
            Box::pin(Arc::clone(&self.inner).run());
        let shared = refresh.shared();
        state.in_flight = Some(shared.clone());
        shared
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().in_flight.is_some()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.state.lock().consecutive_failures
    }

    /// Forget earlier failures (fresh sign-in).
    pub fn reset_failures(&self) {
        self.inner.state.lock().consecutive_failures = 0;
    }
}

impl Inner {
    async fn run(self: Arc<Self>) -> Result<String, ClientError> {
        let result = self.attempt().await;
        let outcome = self.settle(result).await;
        self.state.lock().in_flight = None;
        outcome
    }

    async fn attempt(&self) -> Result<String, ClientError> {
        let tokens = self.session.load_tokens().await?;
        let refresh_token = tokens
            .refresh
            .ok_or_else(|| ClientError::Precondition("missing refresh token".into()))?;
        let base_url = self
            .session
            .base_url()
            .await?
            .ok_or_else(|| ClientError::Precondition("missing base URL".into()))?;

        debug!(base_url = %base_url, "refreshing access token");
        let data = do_refresh(self.transport.as_ref(), &base_url, &refresh_token).await?;
        let access = data.access().unwrap_or_default().to_owned();
        self.session.save_tokens(&access, data.refresh()).await?;
        Ok(access)
    }

    async fn settle(
        &self,
        result: Result<String, ClientError>,
    ) -> Result<String, ClientError> {
        let err = match result {
            Ok(token) => {
                self.state.lock().consecutive_failures = 0;
                info!("access token refreshed");
                self.session.emit(SessionEvent::Refreshed);
                return Ok(token);
            }
            Err(err) => err,
        };

        if let ClientError::SessionExpired(ref reason) = err {
            warn!(reason = %reason, "refresh endpoint rejected credentials");
            self.state.lock().consecutive_failures = 0;
            self.session.teardown(REFRESH_REJECTED).await;
            return Err(err);
        }
        if !err.counts_toward_threshold() {
            warn!(err = %err, "token refresh not attempted");
            return Err(err);
        }

        let consecutive = {
            let mut state = self.state.lock();
            state.consecutive_failures += 1;
            let count = state.consecutive_failures;
            if count >= self.max_failures {
                state.consecutive_failures = 0;
            }
            count
        };
        warn!(err = %err, consecutive, max = self.max_failures, "token refresh failed");
        self.session.emit(SessionEvent::RefreshFailed { error: err.to_string(), consecutive });

        if consecutive >= self.max_failures {
            self.session.teardown(TOO_MANY_FAILURES).await;
            return Err(ClientError::SessionExpired(TOO_MANY_FAILURES.into()));
        }
        Err(err)
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
