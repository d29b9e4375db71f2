// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound stage: decide what an authentication failure means.

use reqwest::StatusCode;

use crate::credential::oauth::REFRESH_METHOD;
use crate::transport::Request;

/// What the pipeline should do with a received response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the response (or its status error) to the caller as is.
    Pass,
    /// Refresh the access token, then replay the request once.
    Refresh,
    /// The refresh endpoint itself rejected us; tear the session down.
    Expire,
}

pub fn is_auth_error(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Whether `url` targets the token refresh method, relative or absolute.
pub fn is_refresh_call(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).trim_end_matches('/');
    path.ends_with(&format!("method/{REFRESH_METHOD}"))
}

pub fn inspect(request: &Request, status: StatusCode) -> Verdict {
    if request.skip_auth || request.retried || !is_auth_error(status) {
        return Verdict::Pass;
    }
    if is_refresh_call(&request.url) {
        Verdict::Expire
    } else {
        Verdict::Refresh
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
