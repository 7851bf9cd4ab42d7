// src/core/scanner/forms_scanner.rs

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use super::ProbeContext;
use crate::core::models::AnalysisFinding;

static RE_CSRF_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)csrf|xsrf|authenticity_token|__requestverificationtoken|_token|nonce").unwrap());

/// Mixed-content evidence lists at most this many URLs.
const MIXED_CONTENT_SAMPLE: usize = 3;

pub async fn run_forms_checks(ctx: &ProbeContext<'_>) {
    let url = ctx.base_url();
    info!(url = %url, "Starting forms checks.");

    let page = match ctx.probe("Fetch home page", ctx.fetch(&url)).await {
        Ok(page) => page,
        Err(finding) => return ctx.record([finding.at(url)]),
    };

    let findings = match Url::parse(&page.url) {
        Ok(page_url) => analyze_document(&page_url, &page.body),
        Err(e) => vec![AnalysisFinding::new("PROBE_ERROR").at(url).with_evidence(format!("Unparseable final URL: {}", e))],
    };
    ctx.record(findings);
}

/// Inspects every `<form>` and the page's subresources.
pub fn analyze_document(page_url: &Url, html: &str) -> Vec<AnalysisFinding> {
    let document = Html::parse_document(html);
    let mut analyses: Vec<AnalysisFinding> = Vec::new();
    let mut push = |finding: AnalysisFinding| {
        let duplicate = analyses
            .iter()
            .any(|f| f.code == finding.code && f.affected_url == finding.affected_url);
        if !duplicate {
            analyses.push(finding);
        }
    };

    let (Ok(form_sel), Ok(hidden_sel), Ok(password_sel)) = (
        Selector::parse("form"),
        Selector::parse("input[type='hidden'][name]"),
        Selector::parse("input[type='password']"),
    ) else {
        return Vec::new();
    };

    for form in document.select(&form_sel) {
        let action = form.value().attr("action").unwrap_or("").trim();
        let method = form.value().attr("method").unwrap_or("get").trim().to_ascii_lowercase();
        let Ok(target) = page_url.join(action) else {
            debug!(action, "Skipping form with unparseable action.");
            continue;
        };
        let target_str = target.to_string();

        if target.scheme() == "http" {
            push(AnalysisFinding::new("FORMS_INSECURE_ACTION").at(target_str.clone()).with_evidence(format!("method={}", method)));
        }
        if target.host_str() != page_url.host_str() {
            push(AnalysisFinding::new("FORMS_EXTERNAL_ACTION").at(target_str.clone()));
        }
        if method == "post" && !has_csrf_field(&form, &hidden_sel) {
            push(AnalysisFinding::new("FORMS_MISSING_CSRF_TOKEN").at(target_str.clone()));
        }

        let autocompleting = form.select(&password_sel).any(|input| {
            !matches!(
                input.value().attr("autocomplete").map(|v| v.trim().to_ascii_lowercase()).as_deref(),
                Some("off" | "new-password" | "current-password")
            )
        });
        if autocompleting {
            push(AnalysisFinding::new("FORMS_PASSWORD_AUTOCOMPLETE").at(target_str));
        }
    }

    if page_url.scheme() == "https" {
        let insecure = insecure_subresources(&document);
        if !insecure.is_empty() {
            let sample: Vec<&str> = insecure.iter().take(MIXED_CONTENT_SAMPLE).map(String::as_str).collect();
            push(
                AnalysisFinding::new("FORMS_MIXED_CONTENT")
                    .at(page_url.as_str())
                    .with_evidence(format!("{} insecure subresource(s): {}", insecure.len(), sample.join(", "))),
            );
        }
    }

    analyses
}

fn has_csrf_field(form: &ElementRef<'_>, hidden: &Selector) -> bool {
    form.select(hidden)
        .filter_map(|input| input.value().attr("name"))
        .any(|name| RE_CSRF_FIELD.is_match(name))
}

/// `http://` URLs loaded by scripts, stylesheets, images or frames.
fn insecure_subresources(document: &Html) -> Vec<String> {
    let mut urls = Vec::new();
    for (css, attr) in [("script[src]", "src"), ("link[rel='stylesheet'][href]", "href"), ("img[src]", "src"), ("iframe[src]", "src")] {
        let Ok(selector) = Selector::parse(css) else { continue };
        for el in document.select(&selector) {
            if let Some(value) = el.value().attr(attr) {
                let value = value.trim();
                if value.get(..7).is_some_and(|scheme| scheme.eq_ignore_ascii_case("http://")) {
                    urls.push(value.to_string());
                }
            }
        }
    }
    urls
}
