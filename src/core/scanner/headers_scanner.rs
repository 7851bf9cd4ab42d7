// src/core/scanner/headers_scanner.rs

use tracing::{debug, info, warn};
use crate::core::models::AnalysisFinding;
use super::ProbeContext;
use reqwest::header::HeaderMap;

/// Reads a header as text. Non-UTF-8 values still count as present.
pub(crate) fn check_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?;
    match value.to_str() {
        Ok(s) => {
            debug!(header_name = name, value = s, "Header found.");
            Some(s.to_string())
        }
        Err(_) => {
            warn!(header_name = name, "Header found but contained invalid UTF-8.");
            Some("[Invalid UTF-8]".to_string())
        }
    }
}

/// Fetches the home page over HTTPS and inspects its security headers.
pub async fn run_headers_checks(ctx: &ProbeContext<'_>) {
    let url = ctx.base_url();
    info!(url = %url, "Starting headers checks.");

    let findings = match ctx.probe("Fetch home page", ctx.fetch(&url)).await {
        Ok(page) => {
            info!(status = %page.status, "Received HTTP response for headers checks.");
            analyze_headers(&page.headers, &page.url, ctx.config.checks.hsts_min_max_age_secs)
        }
        Err(failure) => {
            // The headers step cannot say anything without a response.
            let evidence = failure.evidence.unwrap_or_default();
            vec![AnalysisFinding::new("HEADERS_REQUEST_FAILED").at(url).with_evidence(evidence)]
        }
    };
    ctx.record(findings);
}

pub fn analyze_headers(headers: &HeaderMap, url: &str, hsts_min_max_age: u64) -> Vec<AnalysisFinding> {
    debug!("Analyzing collected header data.");
    let mut analyses = Vec::new();
    let finding = |code: &str| AnalysisFinding::new(code).at(url);

    match check_header(headers, "strict-transport-security") {
        None => analyses.push(finding("HEADERS_HSTS_MISSING")),
        Some(value) => match hsts_max_age(&value) {
            Some(age) if age >= hsts_min_max_age => {}
            Some(age) => analyses.push(
                finding("HEADERS_HSTS_WEAK").with_evidence(format!("max-age={} is below {}", age, hsts_min_max_age)),
            ),
            None => analyses.push(finding("HEADERS_HSTS_WEAK").with_evidence(format!("No usable max-age in \"{}\"", value))),
        },
    }

    let csp = check_header(headers, "content-security-policy");
    match &csp {
        None => analyses.push(finding("HEADERS_CSP_MISSING")),
        Some(policy) if allows_inline_scripts(policy) => {
            analyses.push(finding("HEADERS_CSP_UNSAFE_INLINE").with_evidence(policy.clone()))
        }
        Some(_) => {}
    }

    let frame_ancestors = csp.as_deref().is_some_and(|p| csp_directive(p, "frame-ancestors").is_some());
    if check_header(headers, "x-frame-options").is_none() && !frame_ancestors {
        analyses.push(finding("HEADERS_X_FRAME_OPTIONS_MISSING"));
    }

    match check_header(headers, "x-content-type-options") {
        Some(v) if v.trim().eq_ignore_ascii_case("nosniff") => {}
        Some(v) => analyses.push(finding("HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING").with_evidence(format!("Unexpected value \"{}\"", v))),
        None => analyses.push(finding("HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING")),
    }

    if check_header(headers, "referrer-policy").is_none() {
        analyses.push(finding("HEADERS_REFERRER_POLICY_MISSING"));
    }

    if check_header(headers, "permissions-policy").is_none() {
        analyses.push(finding("HEADERS_PERMISSIONS_POLICY_MISSING"));
    }

    if check_header(headers, "access-control-allow-origin").is_some_and(|v| v.trim() == "*") {
        analyses.push(finding("HEADERS_CORS_WILDCARD").with_evidence("Access-Control-Allow-Origin: *"));
    }

    analyses
}

fn hsts_max_age(value: &str) -> Option<u64> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| {
            let (key, val) = part.split_once('=')?;
            key.trim().eq_ignore_ascii_case("max-age").then(|| val.trim().trim_matches('"').parse().ok())?
        })
}

/// Returns the value of `name` in a CSP header, if the directive is present.
fn csp_directive<'a>(policy: &'a str, name: &str) -> Option<&'a str> {
    policy.split(';').map(str::trim).find_map(|directive| {
        let mut parts = directive.splitn(2, char::is_whitespace);
        let key = parts.next()?;
        key.eq_ignore_ascii_case(name).then(|| parts.next().unwrap_or("").trim())
    })
}

/// `'unsafe-inline'` in the effective script source, not neutralized by a nonce or hash.
fn allows_inline_scripts(policy: &str) -> bool {
    let Some(sources) = csp_directive(policy, "script-src").or_else(|| csp_directive(policy, "default-src")) else {
        return false;
    };
    let sources = sources.to_ascii_lowercase();
    sources.contains("'unsafe-inline'") && !sources.contains("'nonce-") && !sources.contains("'sha")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    const URL: &str = "https://example.com/";
    const SIX_MONTHS: u64 = 15_552_000;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn codes(findings: &[AnalysisFinding]) -> Vec<&str> {
        findings.iter().map(|f| f.code.as_str()).collect()
    }

    #[test]
    fn hardened_response_is_clean() {
        let map = headers(&[
            ("strict-transport-security", "max-age=31536000; includeSubDomains"),
            ("content-security-policy", "default-src 'self'; frame-ancestors 'none'"),
            ("x-content-type-options", "nosniff"),
            ("referrer-policy", "strict-origin-when-cross-origin"),
            ("permissions-policy", "geolocation=()"),
        ]);
        assert!(analyze_headers(&map, URL, SIX_MONTHS).is_empty());
    }

    #[test]
    fn bare_response_reports_every_missing_header() {
        let found = analyze_headers(&HeaderMap::new(), URL, SIX_MONTHS);
        assert_eq!(
            codes(&found),
            vec![
                "HEADERS_HSTS_MISSING",
                "HEADERS_CSP_MISSING",
                "HEADERS_X_FRAME_OPTIONS_MISSING",
                "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING",
                "HEADERS_REFERRER_POLICY_MISSING",
                "HEADERS_PERMISSIONS_POLICY_MISSING",
            ]
        );
        assert!(found.iter().all(|f| f.affected_url.as_deref() == Some(URL)));
    }

    #[test]
    fn short_hsts_and_inline_scripts_are_weaknesses() {
        let map = headers(&[
            ("strict-transport-security", "max-age=3600"),
            ("content-security-policy", "script-src 'self' 'unsafe-inline'"),
            ("x-frame-options", "DENY"),
            ("x-content-type-options", "nosniff"),
            ("referrer-policy", "no-referrer"),
            ("permissions-policy", "camera=()"),
            ("access-control-allow-origin", "*"),
        ]);
        assert_eq!(
            codes(&analyze_headers(&map, URL, SIX_MONTHS)),
            vec!["HEADERS_HSTS_WEAK", "HEADERS_CSP_UNSAFE_INLINE", "HEADERS_CORS_WILDCARD"]
        );
    }

    #[test]
    fn nonce_neutralizes_unsafe_inline() {
        assert!(!allows_inline_scripts("script-src 'nonce-abc' 'unsafe-inline'"));
        assert!(allows_inline_scripts("default-src 'self' 'unsafe-inline'"));
        assert!(!allows_inline_scripts("default-src 'self'; style-src 'unsafe-inline'"));
    }

    #[test]
    fn parses_hsts_max_age() {
        assert_eq!(hsts_max_age("max-age=63072000; preload"), Some(63_072_000));
        assert_eq!(hsts_max_age("includeSubDomains; Max-Age=\"600\""), Some(600));
        assert_eq!(hsts_max_age("includeSubDomains"), None);
    }
}
