// src/core/verifier/html_file.rs

use reqwest::header::ACCEPT;
use tracing::debug;

use super::{VerificationFailure, VerificationOutcome};
use crate::config::VerificationConfig;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Only the start of the body is inspected when deciding whether it is HTML.
const HTML_SNIFF_LEN: usize = 2048;

/// Fetches `https://{domain}/.well-known/<file>.txt` and compares its normalized
/// body with the normalized token.
pub async fn attempt(
    client: &reqwest::Client,
    domain: &str,
    token: &str,
    config: &VerificationConfig,
    timeout_secs: u64,
) -> VerificationOutcome {
    let url = format!("https://{}{}", domain, config.well_known_path());
    debug!(url = %url, "Fetching verification file.");

    let response = match client.get(&url).header(ACCEPT, "text/plain").send().await {
        Ok(r) => r,
        Err(e) => return VerificationOutcome::Failed(VerificationFailure::from_request(&url, &e, timeout_secs)),
    };

    let status = response.status();
    if !status.is_success() {
        return VerificationOutcome::Failed(VerificationFailure::HttpStatus { url, status: status.as_u16() });
    }

    match response.text().await {
        Ok(body) => evaluate_body(&url, &body, token),
        Err(e) => VerificationOutcome::Failed(VerificationFailure::from_request(&url, &e, timeout_secs)),
    }
}

/// Decides the outcome for a fetched verification file body.
pub fn evaluate_body(url: &str, body: &str, token: &str) -> VerificationOutcome {
    if looks_like_html(body) {
        debug!(url, "Verification file body is an HTML document.");
        return VerificationOutcome::Failed(VerificationFailure::HtmlIntercepted { url: url.to_string() });
    }

    let published = normalize(body);
    if published.is_empty() {
        return VerificationOutcome::Failed(VerificationFailure::EmptyResponse { url: url.to_string() });
    }

    if published == normalize(token) {
        VerificationOutcome::Verified
    } else {
        VerificationOutcome::Failed(VerificationFailure::mismatch(&published))
    }
}

/// Strips a leading BOM, trims whitespace and removes every line break.
pub fn normalize(value: &str) -> String {
    value
        .trim_start_matches(BYTE_ORDER_MARK)
        .trim()
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect()
}

/// Heuristic: a doctype, `<html` or `<head` near the top means some layer
/// rendered a page instead of serving the literal file.
pub fn looks_like_html(body: &str) -> bool {
    let head: String = body
        .trim_start_matches(BYTE_ORDER_MARK)
        .trim_start()
        .chars()
        .take(HTML_SNIFF_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    head.starts_with("<!doctype") || head.contains("<html") || head.contains("<head")
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/.well-known/vanguard-verify.txt";
    const TOKEN: &str = "vanguard-verify-0123abcd";

    #[test]
    fn plain_token_verifies() {
        assert!(evaluate_body(URL, TOKEN, TOKEN).is_verified());
    }

    #[test]
    fn bom_whitespace_and_line_breaks_are_ignored() {
        let body = "\u{feff}  vanguard-verify-\r\n0123abcd\n\n";
        assert!(evaluate_body(URL, body, TOKEN).is_verified());
    }

    #[test]
    fn html_fallback_page_is_reported_as_interception() {
        let body = "<!DOCTYPE html><html><head><title>App</title></head><body></body></html>";
        assert_eq!(
            evaluate_body(URL, body, TOKEN),
            VerificationOutcome::Failed(VerificationFailure::HtmlIntercepted { url: URL.to_string() })
        );

        let fragment = "\n  <HTML lang=\"en\"><body>vanguard-verify-0123abcd</body></HTML>";
        assert!(matches!(
            evaluate_body(URL, fragment, TOKEN),
            VerificationOutcome::Failed(VerificationFailure::HtmlIntercepted { .. })
        ));
    }

    #[test]
    fn wrong_and_empty_bodies_fail_distinctly() {
        assert!(matches!(
            evaluate_body(URL, "vanguard-verify-other", TOKEN),
            VerificationOutcome::Failed(VerificationFailure::TokenMismatch { .. })
        ));
        assert!(matches!(
            evaluate_body(URL, " \r\n ", TOKEN),
            VerificationOutcome::Failed(VerificationFailure::EmptyResponse { .. })
        ));
    }

    #[test]
    fn plain_text_mentioning_tags_later_is_not_html() {
        assert!(!looks_like_html("vanguard-verify-0123abcd"));
        assert!(looks_like_html("<head><meta charset=utf-8></head>"));
    }
}
