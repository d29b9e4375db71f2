// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response values and the transport seam the pipeline sends through.

pub mod auth;
pub mod gate;
pub mod http;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::credential::oauth::urlencoded;
use crate::error::ClientError;

/// Boxed future used by the object-safe async traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An outgoing HTTP request.
///
/// Built once by the caller and moved through the pipeline stages, each of
/// which returns a new value rather than mutating shared state.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Absolute, or relative to the stored base URL's `/api` prefix.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Bypass enrichment and refresh handling (token generation endpoint).
    pub skip_auth: bool,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            skip_auth: false,
            retried: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body and content type.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        let bytes = serde_json::to_vec(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Attach an `application/x-www-form-urlencoded` body.
    pub fn form(mut self, params: &[(&str, &str)]) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
        self.body = Some(Bytes::from(urlencoded(params)));
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Token carried in the `Authorization: Bearer` header, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
    }

    /// Set `Authorization: Bearer <token>`.
    ///
    /// A token that cannot be encoded as a header value leaves the request
    /// unauthenticated, dropping any bearer it already carried.
    pub fn with_bearer(mut self, token: &str) -> Self {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => {
                tracing::warn!(err = %e, "access token is not a valid header value");
                self.headers.remove(AUTHORIZATION);
            }
        }
        self
    }

    pub(crate) fn mark_retried(mut self) -> Self {
        self.retried = true;
        self
    }
}

/// A received HTTP response, fully buffered.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert a non-2xx response into a passthrough error.
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Status { status: self.status.as_u16(), body: self.text() })
        }
    }
}

/// Sends a request over the wire.
///
/// Object-safe for use as `Arc<dyn Transport>`. Any status code is a
/// successful send; only network-level failures are `Err`.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>>;
}
