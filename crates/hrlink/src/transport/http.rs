// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `reqwest`-backed transport.

use std::time::Duration;

use reqwest::Client;

use crate::error::ClientError;
use crate::transport::{BoxFuture, Request, Response, Transport};

/// HTTP transport with a fixed per-request timeout.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { client }
    }

    /// Wrap an existing client (shared connection pool, custom TLS).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        Box::pin(async move {
            let mut builder =
                self.client.request(request.method, request.url.as_str()).headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }
            let resp = builder.send().await.map_err(|e| ClientError::Transport(e.to_string()))?;
            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.bytes().await.map_err(|e| ClientError::Transport(e.to_string()))?;
            Ok(Response { status, headers, body })
        })
    }
}
