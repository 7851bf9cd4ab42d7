// src/core/scanner/dns_scanner.rs

use tracing::{debug, info, warn};

use super::{ProbeContext, ScanResult};
use crate::core::models::AnalysisFinding;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;

/// A list of common DKIM selectors to check for when a specific one is not known.
const COMMON_DKIM_SELECTORS: &[&str] = &["google", "selector1", "selector2", "default", "dkim", "k1", "mail"];

/// A lookup that answered, or the finding explaining why it did not.
pub type Lookup<T> = Result<Option<T>, AnalysisFinding>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmarcData {
    pub record: String,
    pub policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkimRecord {
    pub selector: String,
    pub record: String,
}

/// Raw answers for the mail and certificate-authority records of a domain.
#[derive(Debug)]
pub struct DnsRecords {
    pub spf: Lookup<String>,
    pub dmarc: Lookup<DmarcData>,
    pub dkim: Lookup<Vec<DkimRecord>>,
    pub caa: Lookup<Vec<String>>,
}

/// Runs SPF, DMARC, DKIM and CAA lookups concurrently and analyzes the answers.
pub async fn run_dns_checks(ctx: &ProbeContext<'_>) {
    // Strip "www." prefix to query the root domain, which is standard for these record types.
    let root_target = ctx.domain.strip_prefix("www.").unwrap_or(ctx.domain);
    info!(target = %root_target, "Starting DNS checks.");

    let mut opts = ResolverOpts::default();
    opts.timeout = ctx.config.verification.dns_timeout();
    opts.attempts = 1;
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);

    let (spf, dmarc, dkim, caa) = tokio::join!(
        ctx.probe("SPF lookup", lookup_spf(&resolver, root_target)),
        ctx.probe("DMARC lookup", lookup_dmarc(&resolver, root_target)),
        ctx.probe("DKIM lookup", lookup_dkim(&resolver, root_target)),
        ctx.probe("CAA lookup", lookup_caa(&resolver, root_target)),
    );

    debug!("All DNS lookups completed, starting analysis.");
    let findings = analyze_dns_records(&DnsRecords { spf, dmarc, dkim, caa }, root_target);
    info!(findings = %findings.len(), "DNS checks finished.");
    ctx.record(findings);
}

/// Analyzes the collected DNS records. Failed lookups contribute their own
/// probe finding and nothing else.
pub fn analyze_dns_records(records: &DnsRecords, domain: &str) -> Vec<AnalysisFinding> {
    let mut analyses = Vec::new();
    let at = |code: &str, name: String| AnalysisFinding::new(code).at(name);

    match &records.dmarc {
        Ok(Some(dmarc)) => {
            if dmarc.policy.as_deref().is_some_and(|p| p.eq_ignore_ascii_case("none")) {
                debug!("DMARC analysis: Found policy 'none'.");
                analyses.push(at("DNS_DMARC_POLICY_NONE", format!("_dmarc.{}", domain)).with_evidence(dmarc.record.clone()));
            }
        }
        Ok(None) => analyses.push(at("DNS_DMARC_MISSING", format!("_dmarc.{}", domain))),
        Err(failure) => analyses.push(failure.clone().at(format!("_dmarc.{}", domain))),
    }

    match &records.spf {
        Ok(Some(spf)) => {
            let code = match spf_all_qualifier(spf) {
                Some('+') => Some("DNS_SPF_POLICY_PASS_ALL"),
                Some('~') => Some("DNS_SPF_POLICY_SOFTFAIL"),
                Some('?') => Some("DNS_SPF_POLICY_NEUTRAL"),
                _ => None,
            };
            if let Some(code) = code {
                debug!(code, record = %spf, "SPF analysis: weak 'all' mechanism.");
                analyses.push(at(code, domain.to_string()).with_evidence(spf.clone()));
            }
        }
        Ok(None) => analyses.push(at("DNS_SPF_MISSING", domain.to_string())),
        Err(failure) => analyses.push(failure.clone().at(domain.to_string())),
    }

    match &records.dkim {
        Ok(None) => analyses.push(
            at("DNS_DKIM_MISSING", domain.to_string())
                .with_evidence(format!("Selectors tried: {}", COMMON_DKIM_SELECTORS.join(", "))),
        ),
        Ok(Some(_)) => {}
        Err(failure) => analyses.push(failure.clone().at(domain.to_string())),
    }

    match &records.caa {
        Ok(None) => analyses.push(at("DNS_CAA_MISSING", domain.to_string())),
        Ok(Some(_)) => {}
        Err(failure) => analyses.push(failure.clone().at(domain.to_string())),
    }

    analyses
}

/// The qualifier of the terminal `all` mechanism, `+` when written bare.
fn spf_all_qualifier(record: &str) -> Option<char> {
    record.split_whitespace().rev().find_map(|term| {
        let lower = term.to_ascii_lowercase();
        match lower.as_str() {
            "all" | "+all" => Some('+'),
            "-all" => Some('-'),
            "~all" => Some('~'),
            "?all" => Some('?'),
            _ => None,
        }
    })
}

/// An authoritative "no such record" answer is an empty answer, not an error.
fn empty_or_error<T>(e: ResolveError) -> ScanResult<T> {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => Ok(None),
        _ => Err(format!("DNS Error: {}", e)),
    }
}

async fn txt_records(resolver: &TokioAsyncResolver, name: &str) -> ScanResult<Vec<String>> {
    match resolver.txt_lookup(name).await {
        Ok(lookup) => Ok(Some(
            lookup
                .iter()
                .map(|record| {
                    record
                        .txt_data()
                        .iter()
                        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                        .collect::<String>()
                })
                .collect(),
        )),
        Err(e) => {
            debug!(name, error = %e, "TXT lookup returned no answer.");
            empty_or_error(e)
        }
    }
}

/// SPF records are stored in TXT records and start with "v=spf1".
async fn lookup_spf(resolver: &TokioAsyncResolver, target: &str) -> ScanResult<String> {
    debug!(target, "Looking up SPF record.");
    let records = txt_records(resolver, target).await?.unwrap_or_default();
    Ok(records.into_iter().find(|r| r.to_ascii_lowercase().starts_with("v=spf1")))
}

/// DMARC records are stored in a TXT record at the `_dmarc` subdomain.
async fn lookup_dmarc(resolver: &TokioAsyncResolver, target: &str) -> ScanResult<DmarcData> {
    let dmarc_target = format!("_dmarc.{}", target);
    debug!(target = %dmarc_target, "Looking up DMARC record.");
    let records = txt_records(resolver, &dmarc_target).await?.unwrap_or_default();

    Ok(records
        .into_iter()
        .find(|r| r.to_ascii_lowercase().starts_with("v=dmarc1"))
        .map(|record| {
            // Parse the policy (p=) tag from the record.
            let policy = record
                .split(';')
                .find_map(|tag| tag.trim().strip_prefix("p="))
                .map(|p| p.trim().to_string());
            DmarcData { record, policy }
        }))
}

/// DKIM records are stored in TXT records at `selector._domainkey.domain`.
async fn lookup_dkim(resolver: &TokioAsyncResolver, target: &str) -> ScanResult<Vec<DkimRecord>> {
    debug!(target, "Looking up DKIM records for common selectors.");
    let mut found_records = Vec::new();

    for selector in COMMON_DKIM_SELECTORS {
        let dkim_target = format!("{selector}._domainkey.{target}");
        match txt_records(resolver, &dkim_target).await {
            Ok(records) => {
                for record in records.unwrap_or_default() {
                    if record.starts_with("v=DKIM1") || record.contains("p=") {
                        debug!(selector, "Found DKIM record.");
                        found_records.push(DkimRecord { selector: selector.to_string(), record });
                    }
                }
            }
            Err(e) => {
                // Missing selectors are the norm; only log the failure.
                warn!(selector, target = %dkim_target, error = %e, "DKIM lookup for this selector failed.");
            }
        }
    }

    if found_records.is_empty() {
        Ok(None)
    } else {
        info!(count = %found_records.len(), "Found DKIM records.");
        Ok(Some(found_records))
    }
}

async fn lookup_caa(resolver: &TokioAsyncResolver, target: &str) -> ScanResult<Vec<String>> {
    debug!(target, "Looking up CAA records.");
    match resolver.lookup(target, RecordType::CAA).await {
        Ok(caa_lookup) => {
            let records: Vec<String> = caa_lookup.iter().map(|r| r.to_string()).collect();
            if records.is_empty() {
                return Ok(None);
            }
            info!(count = %records.len(), "Found CAA records.");
            Ok(Some(records))
        }
        Err(e) => empty_or_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(findings: &[AnalysisFinding]) -> Vec<&str> {
        findings.iter().map(|f| f.code.as_str()).collect()
    }

    fn healthy() -> DnsRecords {
        DnsRecords {
            spf: Ok(Some("v=spf1 include:_spf.google.com -all".into())),
            dmarc: Ok(Some(DmarcData { record: "v=DMARC1; p=reject".into(), policy: Some("reject".into()) })),
            dkim: Ok(Some(vec![DkimRecord { selector: "google".into(), record: "v=DKIM1; k=rsa; p=MIGf".into() }])),
            caa: Ok(Some(vec!["0 issue \"letsencrypt.org\"".into()])),
        }
    }

    #[test]
    fn well_configured_domain_is_clean() {
        assert!(analyze_dns_records(&healthy(), "example.com").is_empty());
    }

    #[test]
    fn missing_records_are_each_reported() {
        let records = DnsRecords { spf: Ok(None), dmarc: Ok(None), dkim: Ok(None), caa: Ok(None) };
        let findings = analyze_dns_records(&records, "example.com");
        assert_eq!(
            codes(&findings),
            vec!["DNS_DMARC_MISSING", "DNS_SPF_MISSING", "DNS_DKIM_MISSING", "DNS_CAA_MISSING"]
        );
        assert_eq!(findings[0].affected_url.as_deref(), Some("_dmarc.example.com"));
    }

    #[test]
    fn spf_all_qualifiers_map_to_severities() {
        assert_eq!(spf_all_qualifier("v=spf1 +all"), Some('+'));
        assert_eq!(spf_all_qualifier("v=spf1 mx all"), Some('+'));
        assert_eq!(spf_all_qualifier("v=spf1 mx ~all"), Some('~'));
        assert_eq!(spf_all_qualifier("v=spf1 mx ?ALL"), Some('?'));
        assert_eq!(spf_all_qualifier("v=spf1 mx -all"), Some('-'));
        assert_eq!(spf_all_qualifier("v=spf1 redirect=_spf.example.com"), None);

        let mut records = healthy();
        records.spf = Ok(Some("v=spf1 +all".into()));
        assert_eq!(codes(&analyze_dns_records(&records, "example.com")), vec!["DNS_SPF_POLICY_PASS_ALL"]);
    }

    #[test]
    fn failed_lookups_only_contribute_their_probe_finding() {
        let mut records = healthy();
        records.dmarc = Ok(Some(DmarcData { record: "v=DMARC1; p=none".into(), policy: Some("none".into()) }));
        records.caa = Err(AnalysisFinding::new("PROBE_TIMEOUT").with_evidence("CAA lookup did not finish within 10s"));
        assert_eq!(
            codes(&analyze_dns_records(&records, "example.com")),
            vec!["DNS_DMARC_POLICY_NONE", "PROBE_TIMEOUT"]
        );
    }
}
