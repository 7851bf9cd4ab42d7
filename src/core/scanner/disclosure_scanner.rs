// src/core/scanner/disclosure_scanner.rs

use tracing::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::task::JoinSet;

use super::{fetch_with, FetchedPage, ProbeContext};
use crate::core::models::AnalysisFinding;
use crate::core::scanner::headers_scanner::check_header;
use crate::core::verifier::html_file::looks_like_html;

/// A well-known path that should never be publicly readable.
struct SensitivePath {
    path: &'static str,
    code: &'static str,
    /// Must match the body of a 2xx response for the path to count as exposed.
    signature: &'static Lazy<Regex>,
    /// Catch-all routers answer every path with the app shell; reject HTML bodies.
    reject_html: bool,
}

// Signatures are specific enough that a soft-404 page does not match them.
static RE_VERSIONED_BANNER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][\w.\-]*/v?\d+(\.\d+)*").unwrap());
static RE_GENERATOR_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+").unwrap());
static RE_GIT_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(ref: refs/|[0-9a-f]{40}$)").unwrap());
static RE_GIT_CONFIG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\[core\]").unwrap());
static RE_ENV_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[A-Z][A-Z0-9_]*\s*=").unwrap());
static RE_SERVER_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Apache Server Status for|Server uptime:").unwrap());
static RE_PHPINFO: Lazy<Regex> = Lazy::new(|| Regex::new(r"<title>phpinfo\(\)</title>|PHP Version \d").unwrap());
static RE_DIR_LISTING: Lazy<Regex> = Lazy::new(|| Regex::new(r"<title>Index of /|<h1>Directory listing for /").unwrap());
static RE_SECURITY_CONTACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*contact:\s*\S").unwrap());

static SENSITIVE_PATHS: &[SensitivePath] = &[
    SensitivePath { path: "/.git/HEAD", code: "DISCLOSURE_GIT_EXPOSED", signature: &RE_GIT_HEAD, reject_html: true },
    SensitivePath { path: "/.git/config", code: "DISCLOSURE_GIT_EXPOSED", signature: &RE_GIT_CONFIG, reject_html: true },
    SensitivePath { path: "/.env", code: "DISCLOSURE_ENV_EXPOSED", signature: &RE_ENV_FILE, reject_html: true },
    SensitivePath { path: "/server-status", code: "DISCLOSURE_SERVER_STATUS", signature: &RE_SERVER_STATUS, reject_html: false },
    SensitivePath { path: "/phpinfo.php", code: "DISCLOSURE_PHPINFO", signature: &RE_PHPINFO, reject_html: false },
    SensitivePath { path: "/info.php", code: "DISCLOSURE_PHPINFO", signature: &RE_PHPINFO, reject_html: false },
    SensitivePath { path: "/uploads/", code: "DISCLOSURE_DIRECTORY_LISTING", signature: &RE_DIR_LISTING, reject_html: false },
    SensitivePath { path: "/backup/", code: "DISCLOSURE_DIRECTORY_LISTING", signature: &RE_DIR_LISTING, reject_html: false },
];

const SECURITY_TXT_PATH: &str = "/.well-known/security.txt";

/// Home page banners, sensitive paths and security.txt, all in parallel. Each
/// part records its findings as soon as it finishes.
pub async fn run_disclosure_checks(ctx: &ProbeContext<'_>) {
    info!(domain = ctx.domain, "Starting disclosure checks.");

    tokio::join!(
        async { ctx.record(check_banners(ctx).await) },
        async {
            if ctx.config.checks.probe_sensitive_paths {
                ctx.record(probe_sensitive_paths(ctx).await);
            }
        },
        async { ctx.record(check_security_txt(ctx).await) },
    );

    info!(domain = ctx.domain, "Disclosure checks finished.");
}

async fn check_banners(ctx: &ProbeContext<'_>) -> Vec<AnalysisFinding> {
    let url = ctx.base_url();
    match ctx.probe("Fetch home page", ctx.fetch(&url)).await {
        Ok(page) => analyze_banners(&page),
        Err(finding) => vec![finding.at(url)],
    }
}

async fn check_security_txt(ctx: &ProbeContext<'_>) -> Option<AnalysisFinding> {
    let url = ctx.url_for(SECURITY_TXT_PATH);
    match ctx.probe("Fetch security.txt", ctx.fetch(&url)).await {
        Ok(page) if security_txt_present(page.status.as_u16(), &page.body) => None,
        Ok(_) => Some(AnalysisFinding::new("DISCLOSURE_SECURITY_TXT_MISSING").at(url)),
        Err(finding) => Some(finding.at(url)),
    }
}

/// Version banners in response headers and the generator meta tag.
pub fn analyze_banners(page: &FetchedPage) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();

    if let Some(server) = check_header(&page.headers, "server") {
        if RE_VERSIONED_BANNER.is_match(&server) {
            debug!(server = %server, "Server header reveals a version.");
            analyses.push(AnalysisFinding::new("DISCLOSURE_SERVER_VERSION").at(&page.url).with_evidence(format!("Server: {}", server)));
        }
    }

    let mut powered_by: Vec<String> = ["x-powered-by", "x-aspnet-version", "x-aspnetmvc-version", "x-generator"]
        .iter()
        .filter_map(|name| check_header(&page.headers, name).map(|v| format!("{}: {}", name, v)))
        .collect();

    if let Some(generator) = versioned_generator(&page.body) {
        powered_by.push(format!("meta generator: {}", generator));
    }

    if !powered_by.is_empty() {
        debug!(banners = ?powered_by, "Technology banners exposed.");
        analyses.push(AnalysisFinding::new("DISCLOSURE_POWERED_BY").at(&page.url).with_evidence(powered_by.join("; ")));
    }
    analyses
}

/// The `<meta name="generator">` content, when it carries a version number.
fn versioned_generator(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("meta[name='generator']").ok()?;
    let content = document.select(&selector).next()?.value().attr("content")?;
    RE_GENERATOR_VERSION.is_match(content).then(|| content.to_string())
}

async fn probe_sensitive_paths(ctx: &ProbeContext<'_>) -> Vec<AnalysisFinding> {
    let timeout = ctx.config.http.probe_timeout();
    let mut set = JoinSet::new();

    for (index, entry) in SENSITIVE_PATHS.iter().enumerate() {
        let client = ctx.no_redirect_client.clone();
        let url = ctx.url_for(entry.path);
        set.spawn(async move {
            let outcome = fetch_path(&client, &url, timeout).await;
            (index, url, outcome)
        });
    }

    let mut hits = Vec::new();
    let mut failures = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, url, Ok(page))) => {
                let entry = &SENSITIVE_PATHS[index];
                if is_exposed(entry, page.status.as_u16(), &page.body) {
                    warn!(url = %url, code = entry.code, "Sensitive path is publicly readable.");
                    hits.push((index, url));
                }
            }
            Ok((_, url, Err(reason))) => {
                debug!(url = %url, error = %reason, "Sensitive path probe failed.");
                failures.push(reason);
            }
            Err(e) => failures.push(format!("Task failed: {}", e)),
        }
    }

    if failures.len() == SENSITIVE_PATHS.len() {
        return vec![AnalysisFinding::new("PROBE_ERROR")
            .at(ctx.base_url())
            .with_evidence(format!("All sensitive path probes failed: {}", failures[0]))];
    }

    hits.sort_by_key(|(index, _)| *index);
    let mut findings: Vec<AnalysisFinding> = Vec::new();
    for (index, url) in hits {
        let code = SENSITIVE_PATHS[index].code;
        if findings.iter().any(|f| f.code == code) {
            continue;
        }
        findings.push(AnalysisFinding::new(code).at(url));
    }
    findings
}

async fn fetch_path(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<FetchedPage, String> {
    tokio::time::timeout(timeout, fetch_with(client, url))
        .await
        .map_err(|_| format!("Timed out after {}s", timeout.as_secs()))?
}

fn is_exposed(entry: &SensitivePath, status: u16, body: &str) -> bool {
    if !(200..300).contains(&status) {
        return false;
    }
    if entry.reject_html && looks_like_html(body) {
        return false;
    }
    entry.signature.is_match(body.trim())
}

pub fn security_txt_present(status: u16, body: &str) -> bool {
    (200..300).contains(&status) && !looks_like_html(body) && RE_SECURITY_CONTACT.is_match(body)
}
