// src/core/scanner/transport_scanner.rs

use tracing::{debug, error, info};

use super::ProbeContext;
use crate::core::models::AnalysisFinding;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use reqwest::header::LOCATION;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use url::Url;
use x509_parser::prelude::*;

/// The leaf certificate fields the transport checks look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject_name: String,
    pub issuer_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Result of the TLS probe on port 443.
#[derive(Debug, Clone, Default)]
pub struct TlsObservation {
    /// Set when the validating handshake failed.
    pub validation_error: Option<String>,
    /// The leaf certificate, read leniently if validation failed.
    pub certificate: Option<CertificateInfo>,
}

enum TlsFailure {
    Connect(String),
    Handshake(String),
}

pub async fn run_transport_checks(ctx: &ProbeContext<'_>) {
    info!(domain = ctx.domain, "Starting transport checks.");
    tokio::join!(
        async { ctx.record(check_tls(ctx).await) },
        async { ctx.record(check_https_redirect(ctx).await) },
    );
}

async fn check_tls(ctx: &ProbeContext<'_>) -> Vec<AnalysisFinding> {
    let url = ctx.base_url();
    let domain = ctx.domain.to_string();
    let timeout = ctx.config.http.probe_timeout();

    debug!("Spawning blocking task for TLS connection.");
    let observation = ctx
        .probe("TLS handshake", async move {
            spawn_blocking(move || perform_tls_scan(&domain, timeout))
                .await
                .unwrap_or_else(|e| {
                    error!(panic = %e, "Blocking TLS task panicked!");
                    Err(format!("Task panicked: {}", e))
                })
        })
        .await;

    match observation {
        Ok(observation) => analyze_tls(
            &observation,
            Utc::now(),
            ctx.config.checks.certificate_expiry_warning_days,
            &url,
        ),
        Err(finding) => vec![finding.at(url)],
    }
}

fn perform_tls_scan(domain: &str, timeout: Duration) -> Result<TlsObservation, String> {
    let strict = TlsConnector::new().map_err(|e| format!("TlsConnector Error: {}", e))?;

    match handshake(&strict, domain, timeout) {
        Ok(certificate) => Ok(TlsObservation { validation_error: None, certificate }),
        Err(TlsFailure::Connect(reason)) => Err(reason),
        Err(TlsFailure::Handshake(reason)) => {
            debug!(domain, error = %reason, "Validating handshake failed, retrying leniently to read the certificate.");
            let lenient = TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
                .map_err(|e| format!("TlsConnector Error: {}", e))?;
            let certificate = handshake(&lenient, domain, timeout).ok().flatten();
            Ok(TlsObservation { validation_error: Some(reason), certificate })
        }
    }
}

fn handshake(connector: &TlsConnector, domain: &str, timeout: Duration) -> Result<Option<CertificateInfo>, TlsFailure> {
    let addr = (domain, 443)
        .to_socket_addrs()
        .map_err(|e| TlsFailure::Connect(format!("Address resolution failed: {}", e)))?
        .next()
        .ok_or_else(|| TlsFailure::Connect(format!("{} has no address records", domain)))?;

    debug!(domain, %addr, "Connecting TCP stream to port 443.");
    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| TlsFailure::Connect(format!("TCP Connection Error: {}", e)))?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|_| stream.set_write_timeout(Some(timeout)))
        .map_err(|e| TlsFailure::Connect(format!("Socket setup failed: {}", e)))?;

    debug!(domain, "Performing TLS handshake.");
    let stream = connector
        .connect(domain, stream)
        .map_err(|e| TlsFailure::Handshake(format!("TLS Handshake Error: {}", e)))?;

    let cert = match stream.peer_certificate() {
        Ok(Some(c)) => c,
        Ok(None) => return Ok(None),
        Err(e) => return Err(TlsFailure::Handshake(format!("Could not get peer certificate: {}", e))),
    };

    let cert_der = cert
        .to_der()
        .map_err(|e| TlsFailure::Handshake(format!("Could not convert certificate to DER: {}", e)))?;
    let (_, x509) = parse_x509_certificate(&cert_der)
        .map_err(|e| TlsFailure::Handshake(format!("X.509 Parse Error: {}", e)))?;

    info!(subject = %x509.subject(), issuer = %x509.issuer(), "Parsed peer certificate.");
    let validity = x509.validity();
    Ok(Some(CertificateInfo {
        subject_name: x509.subject().to_string(),
        issuer_name: x509.issuer().to_string(),
        not_before: asn1_time_to_chrono_utc(&validity.not_before),
        not_after: asn1_time_to_chrono_utc(&validity.not_after),
    }))
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

/// Turns a TLS observation into findings. A validity-window problem explains a
/// failed handshake on its own, so it replaces the generic handshake finding.
pub fn analyze_tls(observation: &TlsObservation, now: DateTime<Utc>, warning_days: i64, url: &str) -> Vec<AnalysisFinding> {
    let certificate_findings = observation
        .certificate
        .as_ref()
        .map(|cert| analyze_certificate(cert, now, warning_days, url))
        .unwrap_or_default();

    match (&observation.validation_error, &observation.certificate) {
        (None, None) => vec![AnalysisFinding::new("TLS_NO_CERTIFICATE").at(url)],
        (None, Some(_)) => certificate_findings,
        (Some(reason), _) => {
            let explains_failure = certificate_findings
                .iter()
                .any(|f| f.code == "TLS_CERT_EXPIRED" || f.code == "TLS_CERT_NOT_YET_VALID");
            if explains_failure {
                return certificate_findings;
            }
            let mut findings = vec![AnalysisFinding::new("TLS_HANDSHAKE_FAILED").at(url).with_evidence(reason.clone())];
            findings.extend(certificate_findings);
            findings
        }
    }
}

pub fn analyze_certificate(cert: &CertificateInfo, now: DateTime<Utc>, warning_days: i64, url: &str) -> Vec<AnalysisFinding> {
    if now < cert.not_before {
        debug!(not_before = %cert.not_before, "Certificate is not yet valid.");
        return vec![AnalysisFinding::new("TLS_CERT_NOT_YET_VALID")
            .at(url)
            .with_evidence(format!("Valid from {} ({})", cert.not_before, cert.subject_name))];
    }
    if now > cert.not_after {
        debug!(expiry_date = %cert.not_after, "Certificate is expired.");
        return vec![AnalysisFinding::new("TLS_CERT_EXPIRED")
            .at(url)
            .with_evidence(format!("Expired on {} ({})", cert.not_after, cert.subject_name))];
    }

    let days_left = cert.not_after.signed_duration_since(now).num_days();
    if days_left <= warning_days {
        debug!(days_left, "Certificate is expiring soon.");
        return vec![AnalysisFinding::new("TLS_CERT_EXPIRING_SOON")
            .at(url)
            .with_evidence(format!("Expires in {} days on {}", days_left, cert.not_after))];
    }
    Vec::new()
}

async fn check_https_redirect(ctx: &ProbeContext<'_>) -> Option<AnalysisFinding> {
    let http_url = format!("http://{}/", ctx.domain);
    match ctx.no_redirect_client.get(&http_url).send().await {
        Ok(response) => {
            let location = response.headers().get(LOCATION).and_then(|v| v.to_str().ok());
            analyze_http_redirect(&http_url, response.status().as_u16(), location)
        }
        Err(e) => {
            // Nothing listening on port 80 leaves nothing to downgrade.
            debug!(url = %http_url, error = %e, "Plain HTTP endpoint not reachable.");
            None
        }
    }
}

/// Flags a plain-HTTP endpoint that serves content or redirects anywhere but HTTPS.
pub fn analyze_http_redirect(http_url: &str, status: u16, location: Option<&str>) -> Option<AnalysisFinding> {
    match status {
        300..=399 => {
            let target = location.and_then(|loc| Url::parse(http_url).ok()?.join(loc).ok());
            match target {
                Some(target) if target.scheme() == "https" => None,
                Some(target) => Some(
                    AnalysisFinding::new("HTTP_NO_HTTPS_REDIRECT")
                        .at(http_url)
                        .with_evidence(format!("Redirects to {}", target)),
                ),
                None => Some(
                    AnalysisFinding::new("HTTP_NO_HTTPS_REDIRECT")
                        .at(http_url)
                        .with_evidence(format!("HTTP {} without a usable Location header", status)),
                ),
            }
        }
        200..=299 => Some(
            AnalysisFinding::new("HTTP_NO_HTTPS_REDIRECT")
                .at(http_url)
                .with_evidence(format!("Content served over plain HTTP with status {}", status)),
        ),
        _ => None,
    }
}
