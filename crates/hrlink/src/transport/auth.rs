// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound stage: route relative URLs and attach the bearer token.

use reqwest::header::AUTHORIZATION;

use crate::base_url::resolve_url;
use crate::transport::Request;

/// Routing and credential inputs resolved from the session for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
}

/// Enrich an outgoing request with base URL and `Authorization` header.
///
/// `skip_auth` requests pass through unmodified. Without a base URL the URL is
/// left as given. A replayed request keeps the bearer it was re-issued with.
pub fn authenticate(request: Request, resolved: &Resolved) -> Request {
    if request.skip_auth {
        return request;
    }

    let mut request = request;
    if let Some(base) = resolved.base_url.as_deref() {
        request.url = resolve_url(base, &request.url);
    }

    let keep_existing = request.retried && request.headers.contains_key(AUTHORIZATION);
    match resolved.access_token.as_deref() {
        Some(token) if !token.is_empty() && !keep_existing => request.with_bearer(token),
        _ => request,
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
