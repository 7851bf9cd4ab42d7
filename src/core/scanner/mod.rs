// src/core/scanner/mod.rs

// This file acts as the public interface for the `scanner` module.
// Each sub-module implements the probes of one check category.
pub mod cookies_scanner;
pub mod disclosure_scanner;
pub mod dns_scanner;
pub mod forms_scanner;
pub mod headers_scanner;
pub mod transport_scanner;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::catalog::{CheckCategory, CheckStep};
use crate::core::error::Result;
use crate::core::models::AnalysisFinding;

/// A lookup that may succeed with data, succeed with nothing found, or fail.
pub type ScanResult<T> = std::result::Result<Option<T>, String>;

/// Largest response body read by any probe.
const MAX_BODY_BYTES: usize = 512 * 1024;

/// Runs the probes of exactly one catalog step against a domain.
///
/// Probe-level failures are reported as findings, never as `Err`. An `Err` here
/// is an unexpected failure and fails the whole scan.
#[async_trait]
pub trait CheckRunner: Send + Sync {
    async fn run(&self, step: &CheckStep, domain: &str) -> Result<Vec<AnalysisFinding>>;
}

/// Borrowed state shared by the probes of one step.
pub struct ProbeContext<'a> {
    pub domain: &'a str,
    /// Follows up to five redirects.
    pub client: &'a reqwest::Client,
    /// Never follows redirects, for inspecting them.
    pub no_redirect_client: &'a reqwest::Client,
    pub config: &'a Config,
    /// Findings recorded so far. Survives the step being cut off by its budget.
    found: Mutex<Vec<AnalysisFinding>>,
}

impl<'a> ProbeContext<'a> {
    pub fn new(
        domain: &'a str,
        client: &'a reqwest::Client,
        no_redirect_client: &'a reqwest::Client,
        config: &'a Config,
    ) -> Self {
        Self { domain, client, no_redirect_client, config, found: Mutex::default() }
    }

    /// Adds findings to the step's result as soon as they are known.
    pub fn record(&self, findings: impl IntoIterator<Item = AnalysisFinding>) {
        self.found.lock().unwrap_or_else(PoisonError::into_inner).extend(findings);
    }

    fn take_recorded(&self) -> Vec<AnalysisFinding> {
        std::mem::take(&mut *self.found.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn base_url(&self) -> String {
        format!("https://{}/", self.domain)
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("https://{}{}", self.domain, path)
    }

    /// Runs `operation` under the per-probe timeout. Errors and timeouts come
    /// back as `info` findings so the caller can record them and move on.
    pub async fn probe<T, F>(&self, operation: &str, fut: F) -> std::result::Result<T, AnalysisFinding>
    where
        F: Future<Output = std::result::Result<T, String>>,
    {
        match tokio::time::timeout(self.config.http.probe_timeout(), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(reason)) => {
                warn!(domain = self.domain, operation, error = %reason, "Probe failed.");
                Err(AnalysisFinding::new("PROBE_ERROR").with_evidence(format!("{}: {}", operation, reason)))
            }
            Err(_) => {
                warn!(domain = self.domain, operation, "Probe timed out.");
                Err(AnalysisFinding::new("PROBE_TIMEOUT").with_evidence(format!(
                    "{} did not finish within {}s",
                    operation, self.config.http.probe_timeout_secs
                )))
            }
        }
    }

    /// Plain GET of `url` with the redirect-following client.
    pub async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, String> {
        fetch_with(self.client, url).await
    }
}

/// What the HTTP probes need from one response.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

/// GETs `url` and reads at most `MAX_BODY_BYTES` of the body.
pub async fn fetch_with(client: &reqwest::Client, url: &str) -> std::result::Result<FetchedPage, String> {
    debug!(url, "Fetching page.");
    let mut response = client.get(url).send().await.map_err(|e| format!("HTTP request failed: {}", e))?;
    let final_url = response.url().to_string();
    let status = response.status();
    let headers = response.headers().clone();

    let mut bytes: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| format!("Failed to read response body: {}", e))?
    {
        let room = MAX_BODY_BYTES - bytes.len();
        bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if bytes.len() >= MAX_BODY_BYTES {
            debug!(url, "Response body truncated.");
            break;
        }
    }
    // A multi-byte character split by the cap decodes as a replacement character.
    let body = String::from_utf8_lossy(&bytes).into_owned();

    Ok(FetchedPage { url: final_url, status, headers, body })
}

/// The production runner: real network probes for each category.
pub struct NetworkChecks {
    client: reqwest::Client,
    no_redirect_client: reqwest::Client,
    config: Config,
}

impl NetworkChecks {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .timeout(config.http.probe_timeout())
            .redirect(Policy::limited(5))
            .build()?;
        let no_redirect_client = reqwest::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .timeout(config.http.probe_timeout())
            .redirect(Policy::none())
            .build()?;

        Ok(Self { client, no_redirect_client, config: config.clone() })
    }
}

#[async_trait]
impl CheckRunner for NetworkChecks {
    async fn run(&self, step: &CheckStep, domain: &str) -> Result<Vec<AnalysisFinding>> {
        info!(domain, step = step.name, "Running check category.");
        let ctx = ProbeContext::new(domain, &self.client, &self.no_redirect_client, &self.config);

        let checks = async {
            match step.category {
                CheckCategory::Transport => transport_scanner::run_transport_checks(&ctx).await,
                CheckCategory::Headers => headers_scanner::run_headers_checks(&ctx).await,
                CheckCategory::Cookies => cookies_scanner::run_cookie_checks(&ctx).await,
                CheckCategory::Disclosure => disclosure_scanner::run_disclosure_checks(&ctx).await,
                CheckCategory::Forms => forms_scanner::run_forms_checks(&ctx).await,
                CheckCategory::Dns => dns_scanner::run_dns_checks(&ctx).await,
            }
        };

        let findings = run_within_budget(&ctx, step, self.config.http.step_budget(), checks).await;
        info!(domain, step = step.name, findings = findings.len(), "Check category finished.");
        Ok(findings)
    }
}

/// Drives `checks` for at most `budget`. Whatever was recorded before the
/// budget ran out is kept, followed by a `STEP_BUDGET_EXCEEDED` marker.
pub async fn run_within_budget<F>(ctx: &ProbeContext<'_>, step: &CheckStep, budget: Duration, checks: F) -> Vec<AnalysisFinding>
where
    F: Future<Output = ()>,
{
    let finished = tokio::time::timeout(budget, checks).await.is_ok();
    let mut findings = ctx.take_recorded();
    if !finished {
        warn!(domain = ctx.domain, step = step.name, kept = findings.len(), "Check category exceeded its time budget.");
        findings.push(
            AnalysisFinding::new("STEP_BUDGET_EXCEEDED")
                .with_evidence(format!("{} exceeded {}s", step.name, budget.as_secs())),
        );
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog;
    use crate::core::knowledge_base::materialize;
    use crate::core::models::Severity;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accepts connections and never answers them.
    async fn silent_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        addr.to_string()
    }

    fn config(probe_timeout_secs: u64, step_budget_secs: u64) -> Config {
        let mut config = Config::default();
        config.http.probe_timeout_secs = probe_timeout_secs;
        config.http.step_budget_secs = step_budget_secs;
        config
    }

    fn codes(findings: &[AnalysisFinding]) -> Vec<&str> {
        findings.iter().map(|f| f.code.as_str()).collect()
    }

    #[tokio::test]
    async fn hanging_fetch_becomes_an_info_timeout() {
        let host = silent_server().await;
        let config = config(1, 5);
        let client = reqwest::Client::new();
        let ctx = ProbeContext::new(&host, &client, &client, &config);

        let failure = ctx.probe("Fetch home page", ctx.fetch(&ctx.base_url())).await.unwrap_err();
        assert_eq!(failure.code, "PROBE_TIMEOUT");
        assert!(failure.evidence.unwrap().contains("Fetch home page"));

        let finding = materialize("scan-1", CheckCategory::Headers, &AnalysisFinding::new("PROBE_TIMEOUT"));
        assert_eq!(finding.severity, Severity::Info);
    }

    #[tokio::test]
    async fn failing_lookup_becomes_an_error_finding() {
        let config = config(1, 5);
        let client = reqwest::Client::new();
        let ctx = ProbeContext::new("example.com", &client, &client, &config);

        let failure = ctx
            .probe("CAA lookup", async { Err::<(), String>("connection refused".into()) })
            .await
            .unwrap_err();
        assert_eq!(failure.code, "PROBE_ERROR");
        assert_eq!(failure.evidence.as_deref(), Some("CAA lookup: connection refused"));
    }

    #[tokio::test]
    async fn overrun_step_keeps_what_it_recorded() {
        let config = config(1, 1);
        let client = reqwest::Client::new();
        let ctx = ProbeContext::new("example.com", &client, &client, &config);
        let step = catalog::steps().iter().find(|s| s.category == CheckCategory::Disclosure).unwrap();

        let checks = async {
            ctx.record([AnalysisFinding::new("DISCLOSURE_GIT_EXPOSED").at("https://example.com/.git/HEAD")]);
            std::future::pending::<()>().await
        };
        let findings = run_within_budget(&ctx, step, Duration::from_secs(1), checks).await;

        assert_eq!(codes(&findings), vec!["DISCLOSURE_GIT_EXPOSED", "STEP_BUDGET_EXCEEDED"]);
    }

    #[tokio::test]
    async fn network_step_over_budget_is_marked() {
        let host = silent_server().await;
        let checks = NetworkChecks::new(&config(5, 1)).unwrap();
        let step = catalog::steps().iter().find(|s| s.category == CheckCategory::Headers).unwrap();

        let findings = checks.run(step, &host).await.unwrap();
        assert_eq!(codes(&findings), vec!["STEP_BUDGET_EXCEEDED"]);
    }

    #[tokio::test]
    async fn disclosure_checks_share_the_budget_instead_of_queueing() {
        // Three 1s fetches fit a 2s budget only when they run side by side.
        let host = silent_server().await;
        let checks = NetworkChecks::new(&config(1, 2)).unwrap();
        let step = catalog::steps().iter().find(|s| s.category == CheckCategory::Disclosure).unwrap();

        let findings = checks.run(step, &host).await.unwrap();
        let codes = codes(&findings);
        assert_eq!(codes.len(), 3, "{codes:?}");
        assert!(codes.iter().all(|c| *c == "PROBE_ERROR" || *c == "PROBE_TIMEOUT"), "{codes:?}");
    }

    #[tokio::test]
    async fn oversized_body_is_cut_at_the_cap() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let body = "a".repeat(MAX_BODY_BYTES * 2);
            let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n", body.len());
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body.as_bytes()).await;
        });

        let client = reqwest::Client::new();
        let page = fetch_with(&client, &format!("http://{}/", addr)).await.unwrap();
        assert_eq!(page.status, StatusCode::OK);
        assert_eq!(page.body.len(), MAX_BODY_BYTES);
    }
}
