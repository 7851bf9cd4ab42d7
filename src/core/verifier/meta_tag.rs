// src/core/verifier/meta_tag.rs

use scraper::{Html, Selector};
use tracing::debug;

use super::{VerificationFailure, VerificationOutcome};

/// Fetches the home page and looks for a `<meta name="...verify..." content="...">`
/// tag whose content equals the token.
pub async fn attempt(client: &reqwest::Client, domain: &str, token: &str, timeout_secs: u64) -> VerificationOutcome {
    let url = format!("https://{}/", domain);
    debug!(url = %url, "Fetching home page for meta tag verification.");

    let response = match client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => return VerificationOutcome::Failed(VerificationFailure::from_request(&url, &e, timeout_secs)),
    };

    let status = response.status();
    if !status.is_success() {
        return VerificationOutcome::Failed(VerificationFailure::HttpStatus { url, status: status.as_u16() });
    }

    match response.text().await {
        Ok(body) => evaluate_document(&url, &body, token),
        Err(e) => VerificationOutcome::Failed(VerificationFailure::from_request(&url, &e, timeout_secs)),
    }
}

pub fn evaluate_document(url: &str, html: &str, token: &str) -> VerificationOutcome {
    let published = extract_verify_tokens(html);
    debug!(url, candidates = published.len(), "Extracted verification meta tags.");

    if published.is_empty() {
        return VerificationOutcome::Failed(VerificationFailure::MetaTagMissing { url: url.to_string() });
    }
    if published.iter().any(|content| content == token) {
        VerificationOutcome::Verified
    } else {
        VerificationOutcome::Failed(VerificationFailure::mismatch(&published[0]))
    }
}

/// Returns the `content` of every meta tag whose `name` mentions "verify",
/// in document order.
pub fn extract_verify_tokens(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut tokens = Vec::new();

    if let Ok(selector) = Selector::parse("meta[name][content]") {
        for el in document.select(&selector) {
            let name = el.value().attr("name").unwrap_or_default().to_ascii_lowercase();
            if !name.contains("verify") {
                continue;
            }
            if let Some(content) = el.value().attr("content") {
                tokens.push(content.to_string());
            }
        }
    }
    tokens
}
