// src/core/scanner/cookies_scanner.rs

use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::{debug, info};

use super::ProbeContext;
use crate::core::models::AnalysisFinding;

/// The security attributes of one `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieFlags {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

pub async fn run_cookie_checks(ctx: &ProbeContext<'_>) {
    let url = ctx.base_url();
    info!(url = %url, "Starting cookie checks.");

    let findings = match ctx.probe("Fetch home page", ctx.fetch(&url)).await {
        Ok(page) => {
            let cookies = collect_cookies(&page.headers);
            debug!(count = cookies.len(), "Collected Set-Cookie headers.");
            analyze_cookies(&cookies, &page.url)
        }
        Err(finding) => vec![finding.at(url)],
    };
    ctx.record(findings);
}

pub fn collect_cookies(headers: &HeaderMap) -> Vec<CookieFlags> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect()
}

pub fn parse_set_cookie(header: &str) -> Option<CookieFlags> {
    let mut parts = header.split(';');
    let (name, _) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut flags = CookieFlags { name: name.to_string(), secure: false, http_only: false, same_site: None };
    for attribute in parts {
        let (key, value) = match attribute.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim())),
            None => (attribute.trim(), None),
        };
        if key.eq_ignore_ascii_case("secure") {
            flags.secure = true;
        } else if key.eq_ignore_ascii_case("httponly") {
            flags.http_only = true;
        } else if key.eq_ignore_ascii_case("samesite") {
            flags.same_site = value.map(|v| v.to_ascii_lowercase());
        }
    }
    Some(flags)
}

/// One finding per missing attribute, naming every cookie that lacks it.
/// `SameSite=None` without `Secure` is rejected by browsers, so it counts as missing.
pub fn analyze_cookies(cookies: &[CookieFlags], url: &str) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();

    let checks: [(&str, Vec<&str>); 3] = [
        ("COOKIE_MISSING_SECURE", names_where(cookies, |c| !c.secure)),
        ("COOKIE_MISSING_HTTPONLY", names_where(cookies, |c| !c.http_only)),
        (
            "COOKIE_MISSING_SAMESITE",
            names_where(cookies, |c| match c.same_site.as_deref() {
                None => true,
                Some("none") => !c.secure,
                Some(_) => false,
            }),
        ),
    ];

    for (code, names) in checks {
        if !names.is_empty() {
            debug!(code, cookies = ?names, "Cookie attribute missing.");
            analyses.push(AnalysisFinding::new(code).at(url).with_evidence(format!("Cookies: {}", names.join(", "))));
        }
    }
    analyses
}

fn names_where(cookies: &[CookieFlags], pred: impl Fn(&CookieFlags) -> bool) -> Vec<&str> {
    cookies.iter().filter(|c| pred(c)).map(|c| c.name.as_str()).collect()
}
