// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential handling: persistence, token cache, single-flight refresh.
//!
//! The [`session::SessionContext`] owns the in-process token cache and the
//! [`store::CredentialStore`] behind it. The [`refresh::RefreshCoordinator`]
//! is the only writer during a refresh and fans a single refresh outcome out
//! to every request waiting on it.

pub mod oauth;
pub mod persist;
pub mod refresh;
pub mod session;
pub mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Store key for the server address entered at sign-in.
pub const BASE_URL_KEY: &str = "baseUrl";
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const EMPLOYEE_ID_KEY: &str = "employee_id";
pub const USER_ID_KEY: &str = "user_id";

/// Current access/refresh token pair. Either half may be absent.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// Events emitted by the session for application state management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SignedIn,
    /// A refresh produced a new access token.
    Refreshed,
    /// A counted refresh attempt failed.
    #[serde(rename = "refresh:failed")]
    RefreshFailed { error: String, consecutive: u32 },
    /// Tokens were cleared; the user must sign in again.
    Expired { reason: String },
    SignedOut,
}

/// Resolve the state directory for the default file store.
///
/// Checks `HRLINK_STATE_DIR`, then `$XDG_STATE_HOME/hrlink`,
/// then `$HOME/.local/state/hrlink`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HRLINK_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("hrlink");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/hrlink");
    }
    PathBuf::from(".hrlink")
}
