// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token endpoint wire types and helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;

/// Whitelisted method that exchanges a refresh token for a new pair.
pub const REFRESH_METHOD: &str = "employee_app.gauth.create_refresh_token";

/// Whitelisted method that exchanges API credentials for a token pair.
pub const SIGN_IN_METHOD: &str = "employee_app.gauth.generate_token_secure";

/// `{"data": {...}}` envelope returned by both token methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenEnvelope {
    #[serde(default)]
    pub data: Option<TokenData>,
}

/// Token payload. Identifiers are only present on sign-in and may be numeric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
}

impl TokenData {
    /// Non-empty access token.
    pub fn access(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Non-empty rotated refresh token.
    pub fn refresh(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn employee_id(&self) -> Option<String> {
        self.employee_id.as_ref().and_then(id_string)
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.as_ref().and_then(id_string)
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a token envelope. A missing `data` object decodes to an empty payload.
pub fn decode_tokens(body: &[u8]) -> Result<TokenData, ClientError> {
    let envelope: TokenEnvelope =
        serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()))?;
    Ok(envelope.data.unwrap_or_default())
}

/// API credentials exchanged at sign-in.
#[derive(Clone, Serialize, Deserialize)]
pub struct SignInCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub app_key: String,
}

impl std::fmt::Debug for SignInCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("app_key", &"<redacted>")
            .finish()
    }
}

/// Build a URL-encoded form body string.
pub fn urlencoded(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding(k), urlencoding(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn urlencoding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
