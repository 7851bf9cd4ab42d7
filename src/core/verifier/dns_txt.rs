// src/core/verifier/dns_txt.rs

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;
use tracing::{debug, warn};

use super::{VerificationFailure, VerificationOutcome};
use crate::config::{PublicResolver, VerificationConfig};

/// TXT answer from one resolver: one entry per record, each record being its
/// list of character-strings.
type TxtAnswer = Vec<Vec<String>>;

/// Checks the domain's TXT records for the token on each configured public
/// resolver in turn. The first resolver that returns the token wins.
pub async fn attempt(domain: &str, token: &str, config: &VerificationConfig) -> VerificationOutcome {
    let mut errors = Vec::new();
    let mut answered = false;
    let mut records_seen = 0;

    for resolver in &config.resolvers {
        match lookup_txt(*resolver, domain, config.dns_timeout()).await {
            Ok(records) => {
                answered = true;
                records_seen = records_seen.max(records.len());
                if match_txt_records(domain, &records, token).is_verified() {
                    debug!(domain, resolver = ?resolver, "Token found in TXT records.");
                    return VerificationOutcome::Verified;
                }
            }
            Err(reason) => {
                warn!(domain, resolver = ?resolver, error = %reason, "TXT lookup failed.");
                errors.push(format!("{:?}: {}", resolver, reason));
            }
        }
    }

    if answered {
        VerificationOutcome::Failed(VerificationFailure::TxtRecordNotFound {
            domain: domain.to_string(),
            records_seen,
        })
    } else {
        VerificationOutcome::Failed(VerificationFailure::DnsLookupFailed(errors.join("; ")))
    }
}

/// Succeeds iff some record's concatenated character-strings equal the token.
pub fn match_txt_records(domain: &str, records: &[Vec<String>], token: &str) -> VerificationOutcome {
    if records.iter().any(|chunks| chunks.concat() == token) {
        VerificationOutcome::Verified
    } else {
        VerificationOutcome::Failed(VerificationFailure::TxtRecordNotFound {
            domain: domain.to_string(),
            records_seen: records.len(),
        })
    }
}

fn resolver_config(resolver: PublicResolver) -> ResolverConfig {
    match resolver {
        PublicResolver::Google => ResolverConfig::google(),
        PublicResolver::Cloudflare => ResolverConfig::cloudflare(),
        PublicResolver::Quad9 => ResolverConfig::quad9(),
    }
}

/// Queries a single public resolver. An authoritative "no such record" answer
/// is an empty answer, not an error.
async fn lookup_txt(resolver: PublicResolver, domain: &str, timeout: Duration) -> Result<TxtAnswer, String> {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    opts.use_hosts_file = false;

    let resolver = TokioAsyncResolver::tokio(resolver_config(resolver), opts);

    // The resolver's own timeout is per query; this bounds retries across its name servers.
    let lookup = tokio::time::timeout(timeout * 2, resolver.txt_lookup(domain))
        .await
        .map_err(|_| format!("timed out after {}s", (timeout * 2).as_secs()))?;

    match lookup {
        Ok(txt) => Ok(txt
            .iter()
            .map(|record| {
                record
                    .txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                    .collect()
            })
            .collect()),
        Err(e) => match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
            _ => Err(e.to_string()),
        },
    }
}
