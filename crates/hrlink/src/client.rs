// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated ERP client: authenticate, send, inspect, refresh, replay.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::base_url::{clean_base_url, method_url};
use crate::config::ClientConfig;
use crate::credential::oauth::{decode_tokens, SignInCredentials, TokenData, SIGN_IN_METHOD};
use crate::credential::refresh::{RefreshCoordinator, REFRESH_REJECTED};
use crate::credential::session::SessionContext;
use crate::credential::store::CredentialStore;
use crate::credential::{SessionEvent, EMPLOYEE_ID_KEY, USER_ID_KEY};
use crate::error::ClientError;
use crate::transport::auth::{authenticate, Resolved};
use crate::transport::gate::{self, Verdict};
use crate::transport::http::ReqwestTransport;
use crate::transport::{BoxFuture, Request, Response, Transport};

/// HTTP client that keeps the session's bearer token fresh.
///
/// Every request is enriched with the stored base URL and access token. An
/// auth failure triggers one shared refresh and a single replay of the
/// request with the new token.
pub struct AuthClient {
    session: Arc<SessionContext>,
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
}

impl AuthClient {
    pub fn new(
        session: Arc<SessionContext>,
        transport: Arc<dyn Transport>,
        max_failures: u32,
    ) -> Self {
        let coordinator =
            RefreshCoordinator::new(Arc::clone(&session), Arc::clone(&transport), max_failures);
        Self { session, transport, coordinator }
    }

    /// Client over `reqwest` with the configured timeout and threshold.
    pub fn from_config(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        let transport = Arc::new(ReqwestTransport::new(config.timeout()));
        Self::new(SessionContext::new(store), transport, config.max_refresh_failures)
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Run a request through the pipeline.
    ///
    /// Non-2xx responses come back as [`ClientError::Status`] after any
    /// refresh handling.
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.run_pipeline(request).await
    }

    fn run_pipeline(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        Box::pin(async move {
            let (resp, sent_with) = self.dispatch(request.clone()).await?;
            match gate::inspect(&request, resp.status) {
                Verdict::Pass => resp.error_for_status(),
                Verdict::Expire => {
                    warn!(status = %resp.status, "refresh endpoint rejected credentials");
                    self.coordinator.reset_failures();
                    self.session.teardown(REFRESH_REJECTED).await;
                    Err(ClientError::SessionExpired(format!("{REFRESH_REJECTED} ({})", resp.status)))
                }
                Verdict::Refresh => {
                    debug!(url = %request.url, status = %resp.status, "auth failure, refreshing");
                    let token = self.fresh_token(sent_with).await?;
                    let replay = request.mark_retried().with_bearer(&token);
                    self.run_pipeline(replay).await
                }
            }
        })
    }

    /// Token to replay with after an auth failure.
    ///
    /// A request sent with a token that has since been rotated replays with
    /// the current one; only a failure of the current token starts a refresh.
    async fn fresh_token(&self, sent_with: Option<String>) -> Result<String, ClientError> {
        match self.session.load_tokens().await?.access {
            Some(current) if sent_with.as_deref() != Some(current.as_str()) => {
                debug!("token rotated while request was in flight, replaying");
                Ok(current)
            }
            _ => self.coordinator.request_refresh().await,
        }
    }

    /// Authenticate and send. Also returns the bearer the request carried.
    async fn dispatch(&self, request: Request) -> Result<(Response, Option<String>), ClientError> {
        let resolved = if request.skip_auth {
            Resolved::default()
        } else {
            Resolved {
                base_url: self.session.base_url().await?,
                access_token: self.session.load_tokens().await?.access,
            }
        };
        let request = authenticate(request, &resolved);
        let sent_with = request.bearer().map(str::to_owned);
        debug!(method = %request.method, url = %request.url, retried = request.retried, "sending");
        let resp = self.transport.send(request).await?;
        Ok((resp, sent_with))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        self.send(Request::get(url)).await?.json()
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Request::post(url).json(body)?).await?.json()
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        self.send(Request::post(url).form(params)).await?.json()
    }

    /// Refresh the access token now, joining any refresh already running.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        self.coordinator.request_refresh().await
    }

    /// Exchange API credentials for a token pair and start a session.
    pub async fn sign_in(
        &self,
        base_url: &str,
        credentials: &SignInCredentials,
    ) -> Result<TokenData, ClientError> {
        let base = clean_base_url(base_url);
        if base.is_empty() {
            return Err(ClientError::Precondition("missing base URL".into()));
        }

        let request = Request::post(method_url(&base, SIGN_IN_METHOD))
            .form(&[
                ("api_key", credentials.api_key.as_str()),
                ("api_secret", credentials.api_secret.as_str()),
                ("app_key", credentials.app_key.as_str()),
            ])
            .skip_auth();
        let resp = self.send(request).await?;
        let data = decode_tokens(&resp.body)?;
        let Some(access) = data.access() else {
            return Err(ClientError::Decode("sign-in returned empty token".into()));
        };

        self.session.set_base_url(&base).await?;
        self.session.replace_tokens(access, data.refresh()).await?;
        let mut ids = Vec::new();
        for (key, value) in [(EMPLOYEE_ID_KEY, data.employee_id()), (USER_ID_KEY, data.user_id())] {
            match value {
                Some(value) => ids.push((key.to_owned(), value)),
                None => self.session.store().remove(key).await?,
            }
        }
        if !ids.is_empty() {
            self.session.store().set_many(ids).await?;
        }

        self.coordinator.reset_failures();
        info!(base_url = %base, "signed in");
        self.session.emit(SessionEvent::SignedIn);
        Ok(data)
    }

    /// Drop the session's tokens. The base URL stays for the next sign-in.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.session.clear_tokens().await?;
        self.session.store().remove(EMPLOYEE_ID_KEY).await?;
        self.session.store().remove(USER_ID_KEY).await?;
        self.coordinator.reset_failures();
        info!("signed out");
        self.session.emit(SessionEvent::SignedOut);
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
