// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::credential::refresh::DEFAULT_MAX_FAILURES;
use crate::credential::state_dir;

/// File name of the default credential store inside the state directory.
pub const STORE_FILE: &str = "credentials.json";

/// Configuration for the authenticated ERP client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// ERP server address. Overrides the stored base URL when given.
    #[arg(long, env = "HRLINK_BASE_URL")]
    pub base_url: Option<String>,

    /// Path to the credential store JSON file.
    #[arg(long, env = "HRLINK_STORE")]
    pub store_path: Option<PathBuf>,

    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "HRLINK_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Consecutive failed refreshes before the session is torn down.
    #[arg(long, default_value_t = DEFAULT_MAX_FAILURES, env = "HRLINK_MAX_REFRESH_FAILURES")]
    pub max_refresh_failures: u32,

    /// Log level filter.
    #[arg(long, default_value = "info", env = "HRLINK_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "HRLINK_LOG_FORMAT")]
    pub log_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            store_path: None,
            timeout_ms: 30_000,
            max_refresh_failures: DEFAULT_MAX_FAILURES,
            log_level: "info".to_owned(),
            log_format: "text".to_owned(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Explicit store path, or `credentials.json` in the state directory.
    pub fn store_path(&self) -> PathBuf {
        match self.store_path {
            Some(ref path) => path.clone(),
            None => state_dir().join(STORE_FILE),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than zero");
        }
        if self.max_refresh_failures == 0 {
            anyhow::bail!("--max-refresh-failures must be at least 1");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other} (expected json or text)"),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
