// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Base URL normalization and relative URL resolution.

/// Path prefix the ERP serves its REST API under.
pub const API_PREFIX: &str = "/api";

/// Normalize a user-entered server address.
///
/// Trims whitespace, drops control characters (U+0000..U+001F) and zero-width
/// spaces (U+200B), and strips trailing slashes. Idempotent.
pub fn clean_base_url(raw: &str) -> String {
    let stripped: String =
        raw.chars().filter(|c| !matches!(*c, '\u{0000}'..='\u{001F}' | '\u{200B}')).collect();
    stripped.trim_start().trim_end_matches(|c: char| c == '/' || c.is_whitespace()).to_owned()
}

/// Whether `url` carries a scheme (`https://...`).
pub fn is_absolute(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolve `url` against `base_url`.
///
/// Absolute URLs are returned untouched. Relative URLs are placed under
/// `clean(base_url) + "/api"`. An empty base leaves the URL as given.
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if is_absolute(url) {
        return url.to_owned();
    }
    let base = clean_base_url(base_url);
    if base.is_empty() {
        return url.to_owned();
    }
    let path = url.trim_start_matches('/');
    if path.is_empty() {
        format!("{base}{API_PREFIX}")
    } else {
        format!("{base}{API_PREFIX}/{path}")
    }
}

/// Absolute URL of a whitelisted server method (`/api/method/<name>`).
pub fn method_url(base_url: &str, method: &str) -> String {
    resolve_url(base_url, &format!("method/{method}"))
}

#[cfg(test)]
#[path = "base_url_tests.rs"]
mod tests;
