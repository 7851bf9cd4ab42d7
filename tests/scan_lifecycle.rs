// tests/scan_lifecycle.rs

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, Notify};

use vanguard_rs_sentinel::config::Config;
use vanguard_rs_sentinel::core::catalog::{CheckCategory, CheckStep};
use vanguard_rs_sentinel::core::models::{AnalysisFinding, Domain, ScanStatus, VerificationMethod};
use vanguard_rs_sentinel::core::orchestrator::ScanEvent;
use vanguard_rs_sentinel::core::scanner::CheckRunner;
use vanguard_rs_sentinel::core::store::MemoryStore;
use vanguard_rs_sentinel::core::verifier::{OwnershipProbe, VerificationFailure, VerificationOutcome};
use vanguard_rs_sentinel::{Error, Result, Sentinel};

const OWNER: &str = "owner-1";
const INTRUDER: &str = "owner-2";

/// Reports an expired certificate and a missing HSTS header; every other step is clean.
#[derive(Default)]
struct FakeChecks {
    fail_on: Option<CheckCategory>,
    /// When set, the headers step waits for `release` after signalling `entered`.
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

#[async_trait]
impl CheckRunner for FakeChecks {
    async fn run(&self, step: &CheckStep, _domain: &str) -> Result<Vec<AnalysisFinding>> {
        if self.fail_on == Some(step.category) {
            return Err(Error::Internal("resolver crashed".into()));
        }
        match step.category {
            CheckCategory::Transport => Ok(vec![AnalysisFinding::new("TLS_CERT_EXPIRED").at("https://example.com")]),
            CheckCategory::Headers => {
                if let Some((entered, release)) = &self.gate {
                    entered.notify_one();
                    release.notified().await;
                }
                Ok(vec![AnalysisFinding::new("HEADERS_HSTS_MISSING")])
            }
            _ => Ok(Vec::new()),
        }
    }
}

struct FakeProbe {
    verifies: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl OwnershipProbe for FakeProbe {
    async fn attempt(&self, _method: VerificationMethod, domain: &str, _token: &str) -> VerificationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.verifies {
            VerificationOutcome::Verified
        } else {
            VerificationOutcome::Failed(VerificationFailure::TxtRecordNotFound { domain: domain.to_string(), records_seen: 0 })
        }
    }
}

fn sentinel_with(checks: FakeChecks, verifies: bool) -> (Sentinel, Arc<FakeProbe>) {
    let probe = Arc::new(FakeProbe { verifies, calls: AtomicUsize::new(0) });
    let sentinel = Sentinel::new(Config::default(), Arc::new(MemoryStore::new()), probe.clone(), Arc::new(checks));
    (sentinel, probe)
}

async fn verified_domain(sentinel: &Sentinel) -> Domain {
    let domain = sentinel.create_domain(OWNER, "https://Example.com/").await.unwrap();
    let report = sentinel.verify_domain(OWNER, &domain.id, VerificationMethod::DnsTxt).await.unwrap();
    assert!(report.verified);
    sentinel.get_domain(OWNER, &domain.id).await.unwrap()
}

#[tokio::test]
async fn scan_walks_every_step_then_stays_completed() {
    let (sentinel, _) = sentinel_with(FakeChecks::default(), true);
    let domain = verified_domain(&sentinel).await;
    let scan = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Pending);

    let steps = sentinel.check_steps().len();
    for i in 0..steps {
        let outcome = sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();
        assert_eq!(outcome.current_step, i);
        assert_eq!(outcome.completed, i + 1 == steps);
    }

    let summary = sentinel.get_scan_summary(OWNER, &scan.id).await.unwrap();
    assert_eq!(summary.scan.status, ScanStatus::Completed);
    assert_eq!(summary.scan.progress, 100);
    assert!(summary.scan.started_at.is_some());
    assert!(summary.scan.completed_at.is_some());
    assert_eq!(summary.findings.len(), 2);

    // One more invocation changes nothing.
    let again = sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();
    assert!(again.completed);
    assert_eq!(again.new_findings, 0);
    assert_eq!(again.progress, 100);
    let after = sentinel.get_scan_summary(OWNER, &scan.id).await.unwrap();
    assert_eq!(after.findings.len(), 2);
    assert_eq!(after.scan.completed_at, summary.scan.completed_at);
}

#[tokio::test]
async fn partial_summary_scores_only_assessed_categories() {
    let (sentinel, _) = sentinel_with(FakeChecks::default(), true);
    let domain = verified_domain(&sentinel).await;
    let scan = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();

    sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();
    sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();

    let summary = sentinel.get_scan_summary(OWNER, &scan.id).await.unwrap();
    assert_eq!(summary.scan.status, ScanStatus::Running);
    assert_eq!(summary.score.overall_score, 75);
    assert_eq!(summary.score.rating, "Good");

    let score_of = |category| {
        summary.score.category_scores.iter().find(|c| c.category == category).and_then(|c| c.score)
    };
    assert_eq!(score_of(CheckCategory::Transport), Some(80));
    assert_eq!(score_of(CheckCategory::Headers), Some(95));
    assert_eq!(score_of(CheckCategory::Cookies), None);
    assert_eq!(score_of(CheckCategory::Dns), None);
}

#[tokio::test]
async fn only_one_active_scan_per_domain() {
    let (sentinel, _) = sentinel_with(FakeChecks::default(), true);
    let domain = verified_domain(&sentinel).await;
    let first = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();

    let err = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap_err();
    assert!(matches!(err, Error::ActiveScanExists { ref scan_id } if *scan_id == first.id));

    sentinel.cancel_scan(OWNER, &first.id).await.unwrap();
    let second = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();
    assert_ne!(second.id, first.id);

    let scans = sentinel.scans_for_domain(OWNER, &domain.id).await.unwrap();
    assert_eq!(scans.len(), 2);
}

#[tokio::test]
async fn cancelled_scan_ignores_further_steps() {
    let (sentinel, _) = sentinel_with(FakeChecks::default(), true);
    let domain = verified_domain(&sentinel).await;
    let scan = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();

    sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();
    let cancelled = sentinel.cancel_scan(OWNER, &scan.id).await.unwrap();
    assert_eq!(cancelled.status, ScanStatus::Cancelled);

    let outcome = sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.status, ScanStatus::Cancelled);
    assert_eq!(outcome.new_findings, 0);

    let summary = sentinel.get_scan_summary(OWNER, &scan.id).await.unwrap();
    assert_eq!(summary.scan.current_step_index, 1);
    assert_eq!(summary.findings.len(), 1);

    let err = sentinel.cancel_scan(OWNER, &scan.id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidScanState { action: "cancel", .. }));
}

#[tokio::test]
async fn step_in_flight_during_cancel_keeps_its_findings() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let checks = FakeChecks { fail_on: None, gate: Some((entered.clone(), release.clone())) };
    let (sentinel, _) = sentinel_with(checks, true);
    let sentinel = Arc::new(sentinel);
    let domain = verified_domain(&sentinel).await;
    let scan = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();
    sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();

    let stepping = {
        let sentinel = sentinel.clone();
        let scan_id = scan.id.clone();
        tokio::spawn(async move { sentinel.execute_scan_step(OWNER, &scan_id).await })
    };
    entered.notified().await;
    sentinel.cancel_scan(OWNER, &scan.id).await.unwrap();
    release.notify_one();

    let outcome = stepping.await.unwrap().unwrap();
    assert_eq!(outcome.status, ScanStatus::Cancelled);

    let summary = sentinel.get_scan_summary(OWNER, &scan.id).await.unwrap();
    assert_eq!(summary.scan.status, ScanStatus::Cancelled);
    assert_eq!(summary.scan.current_step_index, 2);
    assert!(summary.findings.iter().any(|f| f.code == "HEADERS_HSTS_MISSING"));
}

#[tokio::test]
async fn fatal_check_error_fails_the_scan() {
    let checks = FakeChecks { fail_on: Some(CheckCategory::Headers), gate: None };
    let (sentinel, _) = sentinel_with(checks, true);
    let domain = verified_domain(&sentinel).await;
    let scan = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();

    sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();
    let err = sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap_err();
    assert!(matches!(err, Error::ScanFailed { .. }));

    let summary = sentinel.get_scan_summary(OWNER, &scan.id).await.unwrap();
    assert_eq!(summary.scan.status, ScanStatus::Failed);
    assert!(summary.scan.error_message.as_deref().is_some_and(|m| m.contains("resolver crashed")));
    assert!(summary.scan.completed_at.is_some());

    let outcome = sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();
    assert!(outcome.completed);
}

#[tokio::test]
async fn run_scan_reports_every_step_then_finishes() {
    let (sentinel, _) = sentinel_with(FakeChecks::default(), true);
    let domain = verified_domain(&sentinel).await;
    let scan = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    assert!(sentinel.run_scan(OWNER, &scan.id, tx).await.unwrap());

    let mut steps = 0;
    let mut finished = None;
    while let Some(event) = rx.recv().await {
        match event {
            ScanEvent::Step(_) => steps += 1,
            ScanEvent::Finished { status, .. } => finished = Some(status),
            ScanEvent::Failed { message, .. } => panic!("drain failed: {message}"),
        }
    }

    assert_eq!(steps, sentinel.check_steps().len());
    assert_eq!(finished, Some(ScanStatus::Completed));

    let err = sentinel.run_scan(OWNER, &scan.id, mpsc::channel(1).0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidScanState { action: "run", .. }));
}

#[tokio::test]
async fn only_terminal_scans_can_be_deleted() {
    let (sentinel, _) = sentinel_with(FakeChecks::default(), true);
    let domain = verified_domain(&sentinel).await;
    let scan = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();
    sentinel.execute_scan_step(OWNER, &scan.id).await.unwrap();

    let err = sentinel.delete_scan(OWNER, &scan.id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidScanState { action: "delete", status: ScanStatus::Running, .. }));

    sentinel.cancel_scan(OWNER, &scan.id).await.unwrap();
    sentinel.delete_scan(OWNER, &scan.id).await.unwrap();

    let err = sentinel.get_scan_summary(OWNER, &scan.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn other_owners_are_refused() {
    let (sentinel, _) = sentinel_with(FakeChecks::default(), true);
    let domain = verified_domain(&sentinel).await;
    let scan = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap();

    assert!(matches!(sentinel.get_domain(INTRUDER, &domain.id).await, Err(Error::NotOwner { .. })));
    assert!(matches!(sentinel.create_scan(INTRUDER, &domain.id, true).await, Err(Error::NotOwner { .. })));
    assert!(matches!(sentinel.execute_scan_step(INTRUDER, &scan.id).await, Err(Error::NotOwner { .. })));
    assert!(matches!(sentinel.cancel_scan(INTRUDER, &scan.id).await, Err(Error::NotOwner { .. })));
    assert!(matches!(sentinel.get_scan_summary(INTRUDER, &scan.id).await, Err(Error::NotOwner { .. })));

    // The refused calls left the scan alone.
    let summary = sentinel.get_scan_summary(OWNER, &scan.id).await.unwrap();
    assert_eq!(summary.scan.status, ScanStatus::Pending);
}

#[tokio::test]
async fn scanning_requires_consent_and_verification() {
    let (sentinel, probe) = sentinel_with(FakeChecks::default(), false);
    let domain = sentinel.create_domain(OWNER, "example.com").await.unwrap();

    let err = sentinel.create_scan(OWNER, &domain.id, false).await.unwrap_err();
    assert!(matches!(err, Error::ConsentRequired));

    let err = sentinel.create_scan(OWNER, &domain.id, true).await.unwrap_err();
    assert!(matches!(err, Error::DomainNotVerified(_)));

    let report = sentinel.verify_domain(OWNER, &domain.id, VerificationMethod::DnsTxt).await.unwrap();
    assert!(!report.verified);
    assert!(report.diagnostic.is_some());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

    let attempts = sentinel.verification_attempts(OWNER, &domain.id).await.unwrap();
    assert_eq!(attempts.len(), 1);
}

#[tokio::test]
async fn verifying_twice_keeps_the_first_proof() {
    let (sentinel, probe) = sentinel_with(FakeChecks::default(), true);
    let domain = verified_domain(&sentinel).await;
    assert_eq!(domain.verification_method, Some(VerificationMethod::DnsTxt));

    let report = sentinel.verify_domain(OWNER, &domain.id, VerificationMethod::MetaTag).await.unwrap();
    assert!(report.verified);

    let again = sentinel.get_domain(OWNER, &domain.id).await.unwrap();
    assert_eq!(again.verified_at, domain.verified_at);
    assert_eq!(again.verification_method, Some(VerificationMethod::DnsTxt));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(sentinel.verification_attempts(OWNER, &domain.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn registering_the_same_name_twice_is_a_conflict() {
    let (sentinel, _) = sentinel_with(FakeChecks::default(), true);
    let domain = sentinel.create_domain(OWNER, "www.example.com").await.unwrap();

    let err = sentinel.create_domain(OWNER, "https://WWW.example.com/login").await.unwrap_err();
    assert!(matches!(err, Error::DomainAlreadyRegistered { ref domain_id, .. } if *domain_id == domain.id));

    assert!(matches!(sentinel.create_domain(OWNER, "not a domain").await, Err(Error::InvalidDomain { .. })));
}
