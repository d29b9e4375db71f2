// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that run the real `hrlink` binary against a mock ERP.

use hrlink_specs::{Hrlink, MockErp};

#[tokio::test]
async fn login_status_get_logout() -> anyhow::Result<()> {
    let erp = MockErp::spawn().await?;
    let cli = Hrlink::new()?;

    let login = cli.login(&format!("{}/", erp.base_url())).await?;
    assert!(login.success(), "login failed: {}", login.stderr);
    assert_eq!(login.json()?["employee_id"], "HR-EMP-0100");

    let status = cli.run(&["status"]).await?.json()?;
    assert_eq!(status["base_url"], erp.base_url());
    assert_eq!(status["has_access_token"], true);
    assert_eq!(status["has_refresh_token"], true);

    let get = cli.run(&["get", "resource/Employee"]).await?;
    assert!(get.success(), "get failed: {}", get.stderr);
    assert_eq!(get.json()?["data"], "ok");
    assert_eq!(erp.refresh_calls(), 0);

    let logout = cli.run(&["logout"]).await?;
    assert!(logout.success(), "logout failed: {}", logout.stderr);
    let status = cli.run(&["status"]).await?.json()?;
    assert_eq!(status["has_access_token"], false);
    assert_eq!(status["base_url"], erp.base_url());
    Ok(())
}

#[tokio::test]
async fn expired_token_is_refreshed_transparently() -> anyhow::Result<()> {
    let erp = MockErp::spawn().await?;
    let cli = Hrlink::new()?;
    assert!(cli.login(&erp.base_url()).await?.success());

    erp.expire_access_token();
    let get = cli.run(&["get", "resource/Attendance"]).await?;

    assert!(get.success(), "get failed: {}", get.stderr);
    assert_eq!(erp.refresh_calls(), 1);

    // The rotated token was written to disk; the next run needs no refresh.
    let again = cli.run(&["get", "resource/Attendance"]).await?;
    assert!(again.success(), "second get failed: {}", again.stderr);
    assert_eq!(erp.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_exits_with_session_expired() -> anyhow::Result<()> {
    let erp = MockErp::spawn().await?;
    let cli = Hrlink::new()?;
    assert!(cli.login(&erp.base_url()).await?.success());

    erp.expire_access_token();
    erp.set_refresh_status(401);
    let get = cli.run(&["get", "resource/Attendance"]).await?;

    assert_eq!(get.code, Some(3), "stderr: {}", get.stderr);
    let status = cli.run(&["status"]).await?.json()?;
    assert_eq!(status["has_refresh_token"], false);
    Ok(())
}

#[tokio::test]
async fn refresh_without_session_fails() -> anyhow::Result<()> {
    let erp = MockErp::spawn().await?;
    let cli = Hrlink::new()?;

    let out = cli.run(&["--base-url", &erp.base_url(), "refresh"]).await?;

    assert_eq!(out.code, Some(1));
    assert!(out.stderr.contains("missing refresh token"), "stderr: {}", out.stderr);
    assert_eq!(erp.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn invalid_config_exits_2() -> anyhow::Result<()> {
    let cli = Hrlink::new()?;
    let out = cli.run(&["--timeout-ms", "0", "status"]).await?;
    assert_eq!(out.code, Some(2));
    Ok(())
}
