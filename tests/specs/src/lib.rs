// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Runs the real `hrlink` binary as a subprocess against a mock ERP served
//! over TCP, with credentials kept in a throwaway state directory.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use hrlink::credential::oauth::{REFRESH_METHOD, SIGN_IN_METHOD};

/// API key/secret/app key the mock ERP accepts.
pub const API_KEY: &str = "spec-key";
pub const API_SECRET: &str = "spec-secret";
pub const APP_KEY: &str = "spec-app";

/// Resolve the path to the compiled `hrlink` binary.
pub fn hrlink_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("hrlink")
}

/// Shared state behind the mock ERP.
pub struct MockErp {
    addr: SocketAddr,
    valid_token: Mutex<String>,
    refresh_status: Mutex<u16>,
    refresh_calls: AtomicU32,
}

impl MockErp {
    /// Serve the mock on an ephemeral port for the life of the runtime.
    pub async fn spawn() -> anyhow::Result<Arc<Self>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let erp = Arc::new(Self {
            addr: listener.local_addr()?,
            valid_token: Mutex::new(String::new()),
            refresh_status: Mutex::new(200),
            refresh_calls: AtomicU32::new(0),
        });
        let app = Router::new()
            .route(&format!("/api/method/{SIGN_IN_METHOD}"), post(sign_in))
            .route(&format!("/api/method/{REFRESH_METHOD}"), post(refresh))
            .fallback(resource)
            .with_state(Arc::clone(&erp));
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        Ok(erp)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Invalidate the current access token so the next call gets a 401.
    pub fn expire_access_token(&self) {
        *self.valid_token.lock() = "expired-server-side".to_owned();
    }

    pub fn set_refresh_status(&self, status: u16) {
        *self.refresh_status.lock() = status;
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::Relaxed)
    }
}

async fn sign_in(State(erp): State<Arc<MockErp>>, body: String) -> (StatusCode, String) {
    let expected = format!("api_key={API_KEY}&api_secret={API_SECRET}&app_key={APP_KEY}");
    if body != expected {
        return (StatusCode::UNAUTHORIZED, json!({ "exc_type": "AuthenticationError" }).to_string());
    }
    *erp.valid_token.lock() = "spec-access".to_owned();
    let body = json!({
        "data": {
            "access_token": "spec-access",
            "refresh_token": "spec-refresh",
            "employee_id": "HR-EMP-0100",
            "user_id": "spec@example.com"
        }
    });
    (StatusCode::OK, body.to_string())
}

async fn refresh(State(erp): State<Arc<MockErp>>) -> (StatusCode, String) {
    let n = erp.refresh_calls.fetch_add(1, Ordering::Relaxed) + 1;
    let status = *erp.refresh_status.lock();
    if status != 200 {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (code, "{}".to_owned());
    }
    let token = format!("spec-access-{n}");
    *erp.valid_token.lock() = token.clone();
    let body = json!({ "data": { "access_token": token, "refresh_token": format!("spec-refresh-{n}") } });
    (StatusCode::OK, body.to_string())
}

async fn resource(State(erp): State<Arc<MockErp>>, headers: HeaderMap) -> (StatusCode, String) {
    let expected = format!("Bearer {}", erp.valid_token.lock());
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(got) if got == expected => (StatusCode::OK, json!({ "data": "ok" }).to_string()),
        _ => (StatusCode::UNAUTHORIZED, "{}".to_owned()),
    }
}

/// Output of one `hrlink` invocation.
#[derive(Debug)]
pub struct CliOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn json(&self) -> anyhow::Result<Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }
}

/// Runs `hrlink` with an isolated credential store.
pub struct Hrlink {
    binary: PathBuf,
    state_dir: tempfile::TempDir,
}

impl Hrlink {
    pub fn new() -> anyhow::Result<Self> {
        let binary = hrlink_binary();
        anyhow::ensure!(binary.exists(), "hrlink binary not found at {}", binary.display());
        Ok(Self { binary, state_dir: tempfile::tempdir()? })
    }

    pub fn store_path(&self) -> PathBuf {
        self.state_dir.path().join("credentials.json")
    }

    /// Run one subcommand to completion.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<CliOutput> {
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .env("HRLINK_STATE_DIR", self.state_dir.path())
            .env("HRLINK_LOG_LEVEL", "warn")
            .env_remove("HRLINK_BASE_URL")
            .env_remove("HRLINK_STORE")
            .stdin(Stdio::null())
            .output()
            .await?;
        Ok(CliOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// `hrlink login` with the credentials the mock accepts.
    pub async fn login(&self, base_url: &str) -> anyhow::Result<CliOutput> {
        self.run(&[
            "--base-url",
            base_url,
            "login",
            "--api-key",
            API_KEY,
            "--api-secret",
            API_SECRET,
            "--app-key",
            APP_KEY,
        ])
        .await
    }
}
