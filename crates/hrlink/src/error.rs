// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Errors surfaced by the authenticated client.
///
/// `Clone` so a single refresh outcome can be handed to every request that
/// joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Missing refresh token or base URL. Never reaches the network and never
    /// counts toward the refresh failure threshold.
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// The refresh endpoint answered with a non-2xx status, a malformed body,
    /// or could not be reached.
    #[error("token refresh failed: {0}")]
    Refresh(String),
    /// Terminal: credentials were cleared and the session torn down.
    #[error("session expired: {0}")]
    SessionExpired(String),
    /// Non-2xx response from a business endpoint, returned unmodified.
    #[error("request failed with status {status}")]
    Status { status: u16, body: String },
    /// Network-level failure (connect, timeout, malformed URL).
    #[error("transport error: {0}")]
    Transport(String),
    #[error("credential store error: {0}")]
    Store(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "PRECONDITION",
            Self::Refresh(_) => "REFRESH_FAILED",
            Self::SessionExpired(_) => "SESSION_EXPIRED",
            Self::Status { .. } => "HTTP_STATUS",
            Self::Transport(_) => "TRANSPORT",
            Self::Store(_) => "STORE",
            Self::Decode(_) => "DECODE",
        }
    }

    /// HTTP status carried by a passthrough error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the user must sign in again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }

    /// Whether a refresh that ended in this error counts as a failed attempt.
    pub fn counts_toward_threshold(&self) -> bool {
        !matches!(self, Self::Precondition(_) | Self::SessionExpired(_))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
