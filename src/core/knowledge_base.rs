//! Static, read-only database of every finding a probe can raise, with
//! human-readable explanations and remediation steps. Probes only emit codes;
//! everything shown to the site owner comes from here.

use chrono::Utc;

use crate::core::catalog::CheckCategory;
use crate::core::models::{new_id, AnalysisFinding, Finding, Severity};

/// Everything needed to present one kind of finding.
pub struct FindingDetail {
    /// Unique, machine-readable identifier (e.g. "HEADERS_CSP_MISSING").
    pub code: &'static str,
    pub title: &'static str,
    /// `None` for probe diagnostics that can occur in any category.
    pub category: Option<CheckCategory>,
    pub severity: Severity,
    pub description: &'static str,
    pub remediation: &'static str,
}

static FINDINGS: &[FindingDetail] = &[
    // --- Probe diagnostics ---
    FindingDetail {
        code: "PROBE_ERROR",
        title: "Check Could Not Complete",
        category: None,
        severity: Severity::Info,
        description: "One of the checks in this category could not be completed, so its result is unknown. The rest of the scan continued normally.",
        remediation: "Make sure the site is reachable from the public internet and not blocking automated requests, then run a new scan.",
    },
    FindingDetail {
        code: "PROBE_TIMEOUT",
        title: "Check Timed Out",
        category: None,
        severity: Severity::Info,
        description: "A check did not receive a response in time. Slow or rate-limited servers can cause this; the result of that check is unknown.",
        remediation: "Verify the server responds promptly to requests from outside your network and run a new scan.",
    },
    FindingDetail {
        code: "STEP_BUDGET_EXCEEDED",
        title: "Category Time Budget Exceeded",
        category: None,
        severity: Severity::Info,
        description: "The checks in this category took longer than the time allowed for one scan step and were stopped. Some results in this category may be missing.",
        remediation: "Run a new scan when the site is under less load. Persistent slowness may indicate a network or server problem.",
    },

    // --- Transport ---
    FindingDetail {
        code: "TLS_HANDSHAKE_FAILED",
        title: "TLS Handshake Failed",
        category: Some(CheckCategory::Transport),
        severity: Severity::Critical,
        description: "A secure TLS connection could not be established. Causes include an untrusted or mismatched certificate, unsupported protocol versions or a misconfigured server.",
        remediation: "Install a valid certificate from a trusted authority that covers this hostname, and enable TLS 1.2 or newer.",
    },
    FindingDetail {
        code: "TLS_NO_CERTIFICATE",
        title: "No Certificate Presented",
        category: Some(CheckCategory::Transport),
        severity: Severity::High,
        description: "The server completed the handshake without presenting a certificate, so clients cannot authenticate it.",
        remediation: "Configure the web server to present the site's certificate chain on port 443.",
    },
    FindingDetail {
        code: "TLS_CERT_EXPIRED",
        title: "Certificate Expired",
        category: Some(CheckCategory::Transport),
        severity: Severity::Critical,
        description: "The certificate is past its expiry date. Browsers show blocking warnings and visitors can no longer trust the connection.",
        remediation: "Renew the certificate immediately and automate renewal (for example with an ACME client such as Certbot).",
    },
    FindingDetail {
        code: "TLS_CERT_NOT_YET_VALID",
        title: "Certificate Not Yet Valid",
        category: Some(CheckCategory::Transport),
        severity: Severity::Critical,
        description: "The certificate's validity period has not started yet. Clients reject it exactly as they would an expired one.",
        remediation: "Check the server clock and the certificate's 'not before' date, and reinstall a currently valid certificate.",
    },
    FindingDetail {
        code: "TLS_CERT_EXPIRING_SOON",
        title: "Certificate Expiring Soon",
        category: Some(CheckCategory::Transport),
        severity: Severity::Medium,
        description: "The certificate expires within the warning window. Once it lapses, visitors will be blocked by browser warnings.",
        remediation: "Renew the certificate now and verify that automated renewal is working.",
    },
    FindingDetail {
        code: "HTTP_NO_HTTPS_REDIRECT",
        title: "HTTP Does Not Redirect to HTTPS",
        category: Some(CheckCategory::Transport),
        severity: Severity::High,
        description: "The plain-HTTP version of the site serves content instead of redirecting to HTTPS, so visitors can be served over an unencrypted, tamperable connection.",
        remediation: "Answer every http:// request with a 301 redirect to the matching https:// URL.",
    },

    // --- Headers ---
    FindingDetail {
        code: "HEADERS_REQUEST_FAILED",
        title: "Home Page Unreachable",
        category: Some(CheckCategory::Headers),
        severity: Severity::Info,
        description: "The home page could not be fetched over HTTPS, so response headers could not be inspected.",
        remediation: "Verify that the site is online and reachable from the public internet.",
    },
    FindingDetail {
        code: "HEADERS_HSTS_MISSING",
        title: "HSTS Header Missing",
        category: Some(CheckCategory::Headers),
        severity: Severity::Medium,
        description: "Strict-Transport-Security tells browsers to only use HTTPS for this site. Without it, the first request can be downgraded to HTTP by an attacker on the network.",
        remediation: "Send 'Strict-Transport-Security: max-age=31536000; includeSubDomains' on every HTTPS response.",
    },
    FindingDetail {
        code: "HEADERS_HSTS_WEAK",
        title: "HSTS max-age Too Short",
        category: Some(CheckCategory::Headers),
        severity: Severity::Low,
        description: "The HSTS policy expires quickly, leaving returning visitors exposed to downgrade attacks once it lapses.",
        remediation: "Raise max-age to at least 15552000 (180 days); one year is recommended.",
    },
    FindingDetail {
        code: "HEADERS_CSP_MISSING",
        title: "Content-Security-Policy Missing",
        category: Some(CheckCategory::Headers),
        severity: Severity::Medium,
        description: "A Content-Security-Policy restricts where scripts, styles and other resources may load from, which limits the impact of cross-site scripting.",
        remediation: "Define a Content-Security-Policy that lists trusted sources. Start in report-only mode, then enforce it.",
    },
    FindingDetail {
        code: "HEADERS_CSP_UNSAFE_INLINE",
        title: "CSP Allows Inline Scripts",
        category: Some(CheckCategory::Headers),
        severity: Severity::Low,
        description: "The policy contains 'unsafe-inline' or 'unsafe-eval' for scripts, which removes most of its protection against injected script.",
        remediation: "Replace inline scripts with external files, or use nonces or hashes, and drop 'unsafe-inline' and 'unsafe-eval'.",
    },
    FindingDetail {
        code: "HEADERS_X_FRAME_OPTIONS_MISSING",
        title: "Clickjacking Protection Missing",
        category: Some(CheckCategory::Headers),
        severity: Severity::Medium,
        description: "Neither X-Frame-Options nor a CSP frame-ancestors directive is set, so other sites can embed this one in an invisible frame to trick users into clicking.",
        remediation: "Send 'X-Frame-Options: DENY' (or SAMEORIGIN), or add 'frame-ancestors 'self'' to the CSP.",
    },
    FindingDetail {
        code: "HEADERS_X_CONTENT_TYPE_OPTIONS_MISSING",
        title: "X-Content-Type-Options Missing",
        category: Some(CheckCategory::Headers),
        severity: Severity::Low,
        description: "Without 'nosniff', browsers may guess content types and execute a file disguised as something harmless.",
        remediation: "Send 'X-Content-Type-Options: nosniff' on every response.",
    },
    FindingDetail {
        code: "HEADERS_REFERRER_POLICY_MISSING",
        title: "Referrer-Policy Missing",
        category: Some(CheckCategory::Headers),
        severity: Severity::Low,
        description: "Without a Referrer-Policy, full URLs (including query strings with tokens or personal data) may leak to third-party sites.",
        remediation: "Send 'Referrer-Policy: strict-origin-when-cross-origin' or stricter.",
    },
    FindingDetail {
        code: "HEADERS_PERMISSIONS_POLICY_MISSING",
        title: "Permissions-Policy Missing",
        category: Some(CheckCategory::Headers),
        severity: Severity::Info,
        description: "A Permissions-Policy limits which powerful browser features (camera, geolocation, ...) the site and embedded content may use.",
        remediation: "Send a Permissions-Policy that disables features the site does not need, e.g. 'camera=(), microphone=(), geolocation=()'.",
    },
    FindingDetail {
        code: "HEADERS_CORS_WILDCARD",
        title: "CORS Allows Any Origin",
        category: Some(CheckCategory::Headers),
        severity: Severity::Medium,
        description: "'Access-Control-Allow-Origin: *' lets any website read responses from this origin with JavaScript.",
        remediation: "Restrict Access-Control-Allow-Origin to the specific origins that need access, or remove it.",
    },

    // --- Cookies ---
    FindingDetail {
        code: "COOKIE_MISSING_SECURE",
        title: "Cookie Without Secure Flag",
        category: Some(CheckCategory::Cookies),
        severity: Severity::Medium,
        description: "A cookie can be sent over unencrypted HTTP, where it can be intercepted.",
        remediation: "Add the Secure attribute to every cookie set by the site.",
    },
    FindingDetail {
        code: "COOKIE_MISSING_HTTPONLY",
        title: "Cookie Readable by JavaScript",
        category: Some(CheckCategory::Cookies),
        severity: Severity::Low,
        description: "A cookie lacks HttpOnly, so any injected script can read it. Session cookies are the usual target.",
        remediation: "Add HttpOnly to cookies that scripts do not need to read, session cookies in particular.",
    },
    FindingDetail {
        code: "COOKIE_MISSING_SAMESITE",
        title: "Cookie Without SameSite",
        category: Some(CheckCategory::Cookies),
        severity: Severity::Low,
        description: "Without an explicit SameSite attribute, cross-site requests may carry the cookie, which helps cross-site request forgery.",
        remediation: "Set SameSite=Lax (or Strict) on cookies. Use SameSite=None only together with Secure when cross-site use is required.",
    },

    // --- Information disclosure ---
    FindingDetail {
        code: "DISCLOSURE_SERVER_VERSION",
        title: "Server Version Disclosed",
        category: Some(CheckCategory::Disclosure),
        severity: Severity::Low,
        description: "The Server header reveals the exact software version, which lets attackers look up known vulnerabilities for it.",
        remediation: "Configure the server to omit version numbers (e.g. 'server_tokens off' for nginx, 'ServerTokens Prod' for Apache).",
    },
    FindingDetail {
        code: "DISCLOSURE_POWERED_BY",
        title: "Framework Version Disclosed",
        category: Some(CheckCategory::Disclosure),
        severity: Severity::Low,
        description: "Headers such as X-Powered-By or X-AspNet-Version reveal the application stack and its version.",
        remediation: "Remove X-Powered-By and X-AspNet-Version headers in the application or reverse proxy.",
    },
    FindingDetail {
        code: "DISCLOSURE_GIT_EXPOSED",
        title: "Git Repository Exposed",
        category: Some(CheckCategory::Disclosure),
        severity: Severity::Critical,
        description: "The .git directory is publicly readable. Attackers can reconstruct the source code, history and any secrets ever committed.",
        remediation: "Block access to /.git in the web server configuration and deploy without the repository metadata. Rotate any secrets that were committed.",
    },
    FindingDetail {
        code: "DISCLOSURE_ENV_EXPOSED",
        title: "Environment File Exposed",
        category: Some(CheckCategory::Disclosure),
        severity: Severity::Critical,
        description: "A .env file is publicly readable. These files usually hold database passwords, API keys and other credentials.",
        remediation: "Move the file out of the web root, block dotfiles in the server configuration, and rotate every credential it contained.",
    },
    FindingDetail {
        code: "DISCLOSURE_SERVER_STATUS",
        title: "Server Status Page Exposed",
        category: Some(CheckCategory::Disclosure),
        severity: Severity::Medium,
        description: "The server status page is public and reveals client addresses, requested URLs and internal server details.",
        remediation: "Restrict /server-status to localhost or trusted administrator addresses.",
    },
    FindingDetail {
        code: "DISCLOSURE_PHPINFO",
        title: "phpinfo() Page Exposed",
        category: Some(CheckCategory::Disclosure),
        severity: Severity::High,
        description: "A phpinfo() page is public and reveals configuration, file paths, loaded modules and sometimes environment secrets.",
        remediation: "Delete the phpinfo file from the server.",
    },
    FindingDetail {
        code: "DISCLOSURE_DIRECTORY_LISTING",
        title: "Directory Listing Enabled",
        category: Some(CheckCategory::Disclosure),
        severity: Severity::Medium,
        description: "The server lists directory contents, exposing files that were never meant to be linked or found.",
        remediation: "Disable automatic indexes (e.g. 'Options -Indexes' for Apache, 'autoindex off' for nginx).",
    },
    FindingDetail {
        code: "DISCLOSURE_SECURITY_TXT_MISSING",
        title: "security.txt Missing",
        category: Some(CheckCategory::Disclosure),
        severity: Severity::Info,
        description: "There is no /.well-known/security.txt, so researchers who find a vulnerability have no documented way to report it.",
        remediation: "Publish /.well-known/security.txt with at least a Contact and an Expires field (RFC 9116).",
    },

    // --- Forms ---
    FindingDetail {
        code: "FORMS_INSECURE_ACTION",
        title: "Form Submits Over HTTP",
        category: Some(CheckCategory::Forms),
        severity: Severity::High,
        description: "A form posts its data to an http:// URL, so everything the user types travels unencrypted.",
        remediation: "Change the form action to an https:// URL or a relative path.",
    },
    FindingDetail {
        code: "FORMS_EXTERNAL_ACTION",
        title: "Form Submits to Another Site",
        category: Some(CheckCategory::Forms),
        severity: Severity::Info,
        description: "A form sends its data to a different host. This is often intended (newsletter or payment providers) but should be reviewed.",
        remediation: "Confirm the receiving host is trusted and that users are told where their data goes.",
    },
    FindingDetail {
        code: "FORMS_MISSING_CSRF_TOKEN",
        title: "Form Without Anti-CSRF Token",
        category: Some(CheckCategory::Forms),
        severity: Severity::Low,
        description: "A POST form carries no hidden token, so another site may be able to submit it on a logged-in user's behalf.",
        remediation: "Add a per-session anti-CSRF token to state-changing forms and validate it on the server.",
    },
    FindingDetail {
        code: "FORMS_PASSWORD_AUTOCOMPLETE",
        title: "Password Field Allows Autocomplete",
        category: Some(CheckCategory::Forms),
        severity: Severity::Low,
        description: "A password field does not declare an autocomplete hint, so browsers may store it in ways the site did not intend.",
        remediation: "Set autocomplete=\"current-password\" or \"new-password\" on password inputs.",
    },
    FindingDetail {
        code: "FORMS_MIXED_CONTENT",
        title: "Mixed Content",
        category: Some(CheckCategory::Forms),
        severity: Severity::Medium,
        description: "The HTTPS page loads scripts or stylesheets over plain HTTP, which an attacker on the network can replace.",
        remediation: "Load every script and stylesheet over https://, and consider 'upgrade-insecure-requests' in the CSP.",
    },

    // --- DNS ---
    FindingDetail {
        code: "DNS_DMARC_MISSING",
        title: "DMARC Record Missing",
        category: Some(CheckCategory::Dns),
        severity: Severity::Medium,
        description: "DMARC tells receiving mail servers how to handle mail that fails SPF and DKIM. Without it, the domain is easy to spoof in phishing mail.",
        remediation: "Publish a TXT record at _dmarc.<domain>, starting with 'v=DMARC1; p=none;' and moving to quarantine or reject after reviewing reports.",
    },
    FindingDetail {
        code: "DNS_DMARC_POLICY_NONE",
        title: "DMARC Policy is 'none'",
        category: Some(CheckCategory::Dns),
        severity: Severity::Low,
        description: "The DMARC policy only monitors; spoofed mail is still delivered.",
        remediation: "Once legitimate mail passes SPF and DKIM, change the policy to p=quarantine or p=reject.",
    },
    FindingDetail {
        code: "DNS_SPF_MISSING",
        title: "SPF Record Missing",
        category: Some(CheckCategory::Dns),
        severity: Severity::Low,
        description: "SPF lists the servers allowed to send mail for the domain. Without it, spoofed mail is harder for receivers to reject.",
        remediation: "Publish a TXT record such as 'v=spf1 include:_spf.example-provider.com -all' listing your mail senders.",
    },
    FindingDetail {
        code: "DNS_SPF_POLICY_PASS_ALL",
        title: "SPF Allows Every Sender",
        category: Some(CheckCategory::Dns),
        severity: Severity::High,
        description: "The SPF record ends with '+all', which authorizes every server on the internet to send mail as this domain.",
        remediation: "Replace '+all' with '-all' (or '~all' while testing).",
    },
    FindingDetail {
        code: "DNS_SPF_POLICY_SOFTFAIL",
        title: "SPF Policy is 'Softfail'",
        category: Some(CheckCategory::Dns),
        severity: Severity::Info,
        description: "The SPF record ends with '~all', asking receivers to accept but mark unauthorized mail.",
        remediation: "When the record lists every legitimate sender, switch to '-all'.",
    },
    FindingDetail {
        code: "DNS_SPF_POLICY_NEUTRAL",
        title: "SPF Policy is 'Neutral'",
        category: Some(CheckCategory::Dns),
        severity: Severity::Info,
        description: "The SPF record ends with '?all', which states no policy at all for unlisted senders.",
        remediation: "Change '?all' to '~all' or, preferably, '-all'.",
    },
    FindingDetail {
        code: "DNS_DKIM_MISSING",
        title: "DKIM Record Not Found",
        category: Some(CheckCategory::Dns),
        severity: Severity::Info,
        description: "No DKIM key was found under common selectors. DKIM signs outgoing mail so receivers can verify it really came from this domain.",
        remediation: "Enable DKIM signing at your mail provider and publish the public key it gives you.",
    },
    FindingDetail {
        code: "DNS_CAA_MISSING",
        title: "CAA Record Missing",
        category: Some(CheckCategory::Dns),
        severity: Severity::Info,
        description: "CAA records restrict which certificate authorities may issue certificates for the domain.",
        remediation: "Publish CAA records naming your certificate authority, e.g. '0 issue \"letsencrypt.org\"'.",
    },
];

/// Retrieves the detail for a finding code, if it exists.
pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}

/// Codes recorded when part of a step could not run. A category carrying one
/// of them is reported as incomplete instead of being scored.
pub fn marks_incomplete(code: &str) -> bool {
    matches!(code, "PROBE_ERROR" | "PROBE_TIMEOUT" | "STEP_BUDGET_EXCEEDED" | "HEADERS_REQUEST_FAILED")
}

/// Expands a probe result into a persisted finding for `scan_id`. Unknown codes
/// are recorded as a generic probe diagnostic so nothing is dropped.
pub fn materialize(scan_id: &str, category: CheckCategory, analysis: &AnalysisFinding) -> Finding {
    // FINDINGS[0] is PROBE_ERROR.
    let detail = get_finding_detail(&analysis.code).unwrap_or(&FINDINGS[0]);

    let description = match &analysis.evidence {
        Some(evidence) => format!("{}\n\nObserved: {}", detail.description, evidence),
        None => detail.description.to_string(),
    };

    Finding {
        id: new_id(),
        scan_id: scan_id.to_string(),
        category: detail.category.unwrap_or(category),
        severity: detail.severity,
        code: analysis.code.clone(),
        title: detail.title.to_string(),
        description,
        affected_url: analysis.affected_url.clone(),
        recommendation: detail.remediation.to_string(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<_> = FINDINGS.iter().map(|f| f.code).collect();
        codes.sort_unstable();
        let before = codes.len();
        codes.dedup();
        assert_eq!(before, codes.len());
    }

    #[test]
    fn materialize_uses_detail_and_appends_evidence() {
        let analysis = AnalysisFinding::new("HEADERS_CSP_MISSING")
            .at("https://example.com/")
            .with_evidence("no content-security-policy header");
        let finding = materialize("scan-1", CheckCategory::Headers, &analysis);
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.title, "Content-Security-Policy Missing");
        assert_eq!(finding.affected_url.as_deref(), Some("https://example.com/"));
        assert!(finding.description.ends_with("Observed: no content-security-policy header"));
    }

    #[test]
    fn diagnostics_take_the_step_category() {
        let finding = materialize("scan-1", CheckCategory::Cookies, &AnalysisFinding::new("PROBE_TIMEOUT"));
        assert_eq!(finding.category, CheckCategory::Cookies);
        assert_eq!(finding.severity, Severity::Info);
    }

    #[test]
    fn unknown_codes_fall_back_to_probe_error() {
        let finding = materialize("scan-1", CheckCategory::Dns, &AnalysisFinding::new("NOT_A_CODE"));
        assert_eq!(finding.code, "NOT_A_CODE");
        assert_eq!(finding.title, "Check Could Not Complete");
        assert_eq!(finding.severity, Severity::Info);
    }
}
