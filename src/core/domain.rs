//! Domain input normalization, validation and verification-token issuance.

use tracing::debug;
use url::{Host, Url};
use uuid::Uuid;

use crate::core::error::{Error, Result};

/// Suffixes that never resolve on the public internet.
const NON_PUBLIC_SUFFIXES: &[&str] = &[
    "localhost", "local", "internal", "intranet", "lan", "home", "corp", "home.arpa",
    "test", "example", "invalid", "onion",
];

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Turns user input such as `HTTPS://WWW.Example.com:8443/login?x=1` into a bare,
/// lowercase hostname (`www.example.com`).
///
/// Rejects IP literals, single-label names, reserved/internal suffixes and
/// anything that is not valid hostname syntax.
pub fn normalize_domain(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_domain(raw, "the domain is empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(Error::invalid_domain(raw, "the domain contains whitespace"));
    }

    let with_scheme = match trimmed.find("://") {
        Some(pos) => {
            let scheme = trimmed[..pos].to_ascii_lowercase();
            if scheme != "http" && scheme != "https" {
                return Err(Error::invalid_domain(raw, format!("unsupported scheme '{}'", scheme)));
            }
            trimmed.to_string()
        }
        None => format!("https://{}", trimmed),
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| Error::invalid_domain(raw, format!("not a valid hostname ({})", e)))?;

    let host = match url.host() {
        Some(Host::Domain(d)) => d.trim_end_matches('.').to_ascii_lowercase(),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {
            return Err(Error::invalid_domain(
                raw,
                "IP addresses cannot be verified; enter the site's domain name",
            ));
        }
        None => return Err(Error::invalid_domain(raw, "no hostname found")),
    };

    validate_hostname(raw, &host)?;
    debug!(input = raw, normalized = %host, "Normalized domain input.");
    Ok(host)
}

fn validate_hostname(raw: &str, host: &str) -> Result<()> {
    if host.len() > MAX_DOMAIN_LEN {
        return Err(Error::invalid_domain(raw, "the hostname is longer than 253 characters"));
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err(Error::invalid_domain(raw, "a public domain needs at least two labels"));
    }

    for label in &labels {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(Error::invalid_domain(raw, "every label must be 1 to 63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_domain(raw, "labels cannot start or end with '-'"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::invalid_domain(raw, format!("invalid characters in '{}'", label)));
        }
    }

    // The slice is non-empty: `labels.len() >= 2` was checked above.
    let tld = labels[labels.len() - 1];
    if !(tld.starts_with("xn--") || (tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))) {
        return Err(Error::invalid_domain(raw, format!("'{}' is not a valid top-level domain", tld)));
    }

    if is_non_public(host) {
        return Err(Error::invalid_domain(
            raw,
            "local, private or reserved hostnames cannot be scanned",
        ));
    }
    Ok(())
}

fn is_non_public(host: &str) -> bool {
    NON_PUBLIC_SUFFIXES
        .iter()
        .any(|suffix| host == *suffix || host.ends_with(&format!(".{}", suffix)))
}

/// Issues a fresh, unguessable verification token.
pub fn generate_token(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}
