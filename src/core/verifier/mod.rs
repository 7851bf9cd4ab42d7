// src/core/verifier/mod.rs

//! Domain ownership verification.
//!
//! Three interchangeable proofs are supported, selected by
//! [`VerificationMethod`]. Every proof is a read-only probe that compares the
//! published value with the issued token; a successful HTTP response alone never
//! counts as proof.

pub mod dns_txt;
pub mod html_file;
pub mod meta_tag;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, VerificationConfig};
use crate::core::error::Result;
use crate::core::models::{Domain, VerificationMethod};

/// Longest published value echoed back in a mismatch diagnostic.
const ECHO_LIMIT: usize = 80;

/// Why a verification attempt did not prove ownership. The messages are shown to
/// the domain owner as-is, so each one says what to fix.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error("No TXT record on {domain} matches the verification token ({records_seen} TXT records found). DNS changes can take a while to propagate; try again later.")]
    TxtRecordNotFound { domain: String, records_seen: usize },

    #[error("DNS lookup failed on every public resolver: {0}")]
    DnsLookupFailed(String),

    #[error("Fetching {url} returned HTTP {status}. Make sure the file is publicly reachable without authentication.")]
    HttpStatus { url: String, status: u16 },

    #[error("{url} returned an HTML page instead of the plain-text token. A routing layer or middleware (for example a single-page-app fallback or a CMS rewrite rule) is intercepting the /.well-known/ path; configure it to serve the file as-is.")]
    HtmlIntercepted { url: String },

    #[error("{url} returned an empty body. Paste the verification token into the file.")]
    EmptyResponse { url: String },

    #[error("The published value does not match the verification token (found '{found}').")]
    TokenMismatch { found: String },

    #[error("No <meta name=\"...verify...\" content=\"...\"> tag was found on {url}. Add it inside <head>.")]
    MetaTagMissing { url: String },

    #[error("Request to {url} timed out after {secs}s.")]
    Timeout { url: String, secs: u64 },

    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },
}

impl VerificationFailure {
    pub(crate) fn mismatch(found: &str) -> Self {
        let found = if found.chars().count() > ECHO_LIMIT {
            format!("{}...", found.chars().take(ECHO_LIMIT).collect::<String>())
        } else {
            found.to_string()
        };
        Self::TokenMismatch { found }
    }

    pub(crate) fn from_request(url: &str, error: &reqwest::Error, timeout_secs: u64) -> Self {
        if error.is_timeout() {
            Self::Timeout { url: url.to_string(), secs: timeout_secs }
        } else {
            Self::RequestFailed { url: url.to_string(), reason: error.to_string() }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    Failed(VerificationFailure),
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified)
    }

    pub fn diagnostic(&self) -> Option<String> {
        match self {
            VerificationOutcome::Verified => None,
            VerificationOutcome::Failed(reason) => Some(reason.to_string()),
        }
    }
}

/// One uniform entry point over the closed set of verification methods.
#[async_trait]
pub trait OwnershipProbe: Send + Sync {
    async fn attempt(&self, method: VerificationMethod, domain: &str, token: &str) -> VerificationOutcome;
}

/// The production probe: real DNS and HTTPS lookups against the target.
pub struct NetworkVerifier {
    client: reqwest::Client,
    config: VerificationConfig,
    timeout_secs: u64,
}

impl NetworkVerifier {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .timeout(config.http.probe_timeout())
            .redirect(Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            config: config.verification.clone(),
            timeout_secs: config.http.probe_timeout_secs,
        })
    }
}

#[async_trait]
impl OwnershipProbe for NetworkVerifier {
    async fn attempt(&self, method: VerificationMethod, domain: &str, token: &str) -> VerificationOutcome {
        info!(domain, %method, "Starting ownership verification.");
        let outcome = match method {
            VerificationMethod::DnsTxt => dns_txt::attempt(domain, token, &self.config).await,
            VerificationMethod::HtmlFile => {
                html_file::attempt(&self.client, domain, token, &self.config, self.timeout_secs).await
            }
            VerificationMethod::MetaTag => {
                meta_tag::attempt(&self.client, domain, token, self.timeout_secs).await
            }
        };

        match &outcome {
            VerificationOutcome::Verified => info!(domain, %method, "Ownership verified."),
            VerificationOutcome::Failed(reason) => {
                warn!(domain, %method, reason = %reason, "Ownership verification failed.")
            }
        }
        outcome
    }
}

/// Human-readable setup steps for each method, shown before the first attempt.
pub fn instructions(domain: &Domain, config: &VerificationConfig) -> Vec<(VerificationMethod, String)> {
    vec![
        (
            VerificationMethod::DnsTxt,
            format!(
                "Add a TXT record on {} with the value {}",
                domain.name, domain.verification_token
            ),
        ),
        (
            VerificationMethod::HtmlFile,
            format!(
                "Serve https://{}{} containing only {}",
                domain.name,
                config.well_known_path(),
                domain.verification_token
            ),
        ),
        (
            VerificationMethod::MetaTag,
            format!(
                "Add <meta name=\"{}\" content=\"{}\"> to the <head> of https://{}/",
                config.meta_tag_name, domain.verification_token, domain.name
            ),
        ),
    ]
}
