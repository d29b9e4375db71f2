// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hrlink: authenticated HTTP client core for an HR/attendance ERP.
//!
//! Requests flow through [`client::AuthClient`], which attaches the stored
//! base URL and bearer token, and on a 401/403 joins a single shared token
//! refresh before replaying the request once.

pub mod base_url;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod test_support;
pub mod transport;

pub use client::AuthClient;
pub use error::ClientError;
