// src/core/store.rs

//! Persistence seam for domains, verification attempts, scans and findings.
//!
//! Every method that decides something (admission, state transitions, cursor
//! advance, deletion) does so atomically inside the store, so concurrent
//! callers can never both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::error::{Error, Result};
use crate::core::models::{Domain, Finding, Scan, ScanStatus, VerificationAttempt, VerificationMethod};

pub enum DomainInsert {
    Inserted(Domain),
    /// The owner already registered this name.
    Duplicate(Domain),
}

pub enum ScanAdmission {
    Admitted(Scan),
    /// Another scan of the domain is pending or running.
    Conflict(Scan),
}

/// Outcome of a guarded update. `Rejected` carries the scan as it currently is.
#[derive(Debug)]
pub enum Transition {
    Applied(Scan),
    Rejected(Scan),
}

#[derive(Debug)]
pub enum CommitOutcome {
    Applied(Scan),
    /// The cursor no longer matched; the findings were discarded.
    Stale(Scan),
}

#[derive(Debug)]
pub enum Deletion {
    Deleted,
    Rejected(ScanStatus),
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub to: ScanStatus,
    pub at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl StatusChange {
    pub fn to(status: ScanStatus) -> Self {
        Self { to: status, at: Utc::now(), error_message: None }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// The result of one executed step, committed only if the cursor still points
/// at `expected_index`.
#[derive(Debug, Clone)]
pub struct StepCommit {
    pub expected_index: usize,
    pub findings: Vec<Finding>,
    pub progress: u8,
    pub completed: bool,
}

#[async_trait]
pub trait FindingStore: Send + Sync {
    async fn insert_domain(&self, domain: Domain) -> Result<DomainInsert>;
    async fn get_domain(&self, domain_id: &str) -> Result<Option<Domain>>;
    /// Flips `is_verified` false→true. Returns the domain and whether this call flipped it.
    async fn mark_domain_verified(
        &self,
        domain_id: &str,
        method: VerificationMethod,
        at: DateTime<Utc>,
    ) -> Result<(Domain, bool)>;

    async fn append_verification_attempt(&self, attempt: VerificationAttempt) -> Result<()>;
    async fn verification_attempts(&self, domain_id: &str) -> Result<Vec<VerificationAttempt>>;

    /// Inserts `scan` unless its domain already has an active scan.
    async fn insert_scan_if_idle(&self, scan: Scan) -> Result<ScanAdmission>;
    async fn get_scan(&self, scan_id: &str) -> Result<Option<Scan>>;
    async fn scans_for_domain(&self, domain_id: &str) -> Result<Vec<Scan>>;
    /// Applies `change` only if the current status is one of `from`.
    async fn transition_scan(&self, scan_id: &str, from: &[ScanStatus], change: StatusChange) -> Result<Transition>;
    async fn commit_step(&self, scan_id: &str, commit: StepCommit) -> Result<CommitOutcome>;
    /// Removes a terminal scan together with its findings.
    async fn delete_scan_if_terminal(&self, scan_id: &str) -> Result<Deletion>;
    async fn findings(&self, scan_id: &str) -> Result<Vec<Finding>>;
}

#[derive(Default)]
struct Tables {
    domains: HashMap<String, Domain>,
    attempts: Vec<VerificationAttempt>,
    scans: HashMap<String, Scan>,
    findings: HashMap<String, Vec<Finding>>,
}

/// In-process store. One lock over all tables keeps multi-table updates atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FindingStore for MemoryStore {
    async fn insert_domain(&self, domain: Domain) -> Result<DomainInsert> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .domains
            .values()
            .find(|d| d.owner_id == domain.owner_id && d.name == domain.name)
        {
            return Ok(DomainInsert::Duplicate(existing.clone()));
        }
        tables.domains.insert(domain.id.clone(), domain.clone());
        Ok(DomainInsert::Inserted(domain))
    }

    async fn get_domain(&self, domain_id: &str) -> Result<Option<Domain>> {
        Ok(self.tables.read().await.domains.get(domain_id).cloned())
    }

    async fn mark_domain_verified(
        &self,
        domain_id: &str,
        method: VerificationMethod,
        at: DateTime<Utc>,
    ) -> Result<(Domain, bool)> {
        let mut tables = self.tables.write().await;
        let domain = tables
            .domains
            .get_mut(domain_id)
            .ok_or_else(|| Error::not_found("Domain", domain_id))?;

        if domain.is_verified {
            return Ok((domain.clone(), false));
        }
        domain.is_verified = true;
        domain.verified_at = Some(at);
        domain.verification_method = Some(method);
        Ok((domain.clone(), true))
    }

    async fn append_verification_attempt(&self, attempt: VerificationAttempt) -> Result<()> {
        self.tables.write().await.attempts.push(attempt);
        Ok(())
    }

    async fn verification_attempts(&self, domain_id: &str) -> Result<Vec<VerificationAttempt>> {
        let tables = self.tables.read().await;
        Ok(tables.attempts.iter().filter(|a| a.domain_id == domain_id).cloned().collect())
    }

    async fn insert_scan_if_idle(&self, scan: Scan) -> Result<ScanAdmission> {
        let mut tables = self.tables.write().await;
        if let Some(active) = tables
            .scans
            .values()
            .find(|s| s.domain_id == scan.domain_id && s.status.is_active())
        {
            debug!(domain_id = %scan.domain_id, active_scan = %active.id, "Scan admission refused.");
            return Ok(ScanAdmission::Conflict(active.clone()));
        }
        tables.scans.insert(scan.id.clone(), scan.clone());
        Ok(ScanAdmission::Admitted(scan))
    }

    async fn get_scan(&self, scan_id: &str) -> Result<Option<Scan>> {
        Ok(self.tables.read().await.scans.get(scan_id).cloned())
    }

    async fn scans_for_domain(&self, domain_id: &str) -> Result<Vec<Scan>> {
        let tables = self.tables.read().await;
        let mut scans: Vec<Scan> = tables.scans.values().filter(|s| s.domain_id == domain_id).cloned().collect();
        scans.sort_by_key(|s| s.created_at);
        Ok(scans)
    }

    async fn transition_scan(&self, scan_id: &str, from: &[ScanStatus], change: StatusChange) -> Result<Transition> {
        let mut tables = self.tables.write().await;
        let scan = tables
            .scans
            .get_mut(scan_id)
            .ok_or_else(|| Error::not_found("Scan", scan_id))?;

        if !from.contains(&scan.status) {
            return Ok(Transition::Rejected(scan.clone()));
        }

        debug!(scan_id, from = %scan.status, to = %change.to, "Scan status transition.");
        scan.status = change.to;
        match change.to {
            ScanStatus::Running => scan.started_at = scan.started_at.or(Some(change.at)),
            status if status.is_terminal() => scan.completed_at = Some(change.at),
            _ => {}
        }
        if change.error_message.is_some() {
            scan.error_message = change.error_message;
        }
        Ok(Transition::Applied(scan.clone()))
    }

    async fn commit_step(&self, scan_id: &str, commit: StepCommit) -> Result<CommitOutcome> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let scan = tables
            .scans
            .get_mut(scan_id)
            .ok_or_else(|| Error::not_found("Scan", scan_id))?;

        if scan.current_step_index != commit.expected_index {
            debug!(
                scan_id,
                expected = commit.expected_index,
                actual = scan.current_step_index,
                "Stale step commit discarded."
            );
            return Ok(CommitOutcome::Stale(scan.clone()));
        }

        scan.current_step_index += 1;
        scan.progress = commit.progress;
        // A scan cancelled mid-step keeps what the step found but stays cancelled.
        if commit.completed && scan.status == ScanStatus::Running {
            scan.status = ScanStatus::Completed;
            scan.completed_at = Some(Utc::now());
        }

        tables
            .findings
            .entry(scan_id.to_string())
            .or_default()
            .extend(commit.findings);
        Ok(CommitOutcome::Applied(scan.clone()))
    }

    async fn delete_scan_if_terminal(&self, scan_id: &str) -> Result<Deletion> {
        let mut tables = self.tables.write().await;
        let status = tables
            .scans
            .get(scan_id)
            .map(|s| s.status)
            .ok_or_else(|| Error::not_found("Scan", scan_id))?;

        if !status.is_terminal() {
            return Ok(Deletion::Rejected(status));
        }
        tables.scans.remove(scan_id);
        tables.findings.remove(scan_id);
        Ok(Deletion::Deleted)
    }

    async fn findings(&self, scan_id: &str) -> Result<Vec<Finding>> {
        Ok(self.tables.read().await.findings.get(scan_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::CheckCategory;
    use crate::core::models::{new_id, Severity};

    fn domain(owner: &str, name: &str) -> Domain {
        Domain {
            id: new_id(),
            owner_id: owner.into(),
            name: name.into(),
            verification_token: "vanguard-verify-test".into(),
            is_verified: true,
            verified_at: Some(Utc::now()),
            verification_method: Some(VerificationMethod::DnsTxt),
            created_at: Utc::now(),
        }
    }

    fn finding(scan_id: &str) -> Finding {
        Finding {
            id: new_id(),
            scan_id: scan_id.into(),
            category: CheckCategory::Headers,
            severity: Severity::Low,
            code: "HEADERS_REFERRER_POLICY_MISSING".into(),
            title: "Referrer-Policy missing".into(),
            description: String::new(),
            affected_url: None,
            recommendation: String::new(),
            created_at: Utc::now(),
        }
    }

    async fn running_scan(store: &MemoryStore) -> Scan {
        let d = domain("alice", "example.com");
        let ScanAdmission::Admitted(scan) = store.insert_scan_if_idle(Scan::new(&d, true)).await.unwrap() else {
            panic!("fresh store must admit");
        };
        match store
            .transition_scan(&scan.id, &[ScanStatus::Pending], StatusChange::to(ScanStatus::Running))
            .await
            .unwrap()
        {
            Transition::Applied(scan) => scan,
            Transition::Rejected(_) => panic!("pending scan must start"),
        }
    }

    #[tokio::test]
    async fn duplicate_domains_are_per_owner() {
        let store = MemoryStore::new();
        assert!(matches!(store.insert_domain(domain("alice", "example.com")).await.unwrap(), DomainInsert::Inserted(_)));
        assert!(matches!(store.insert_domain(domain("alice", "example.com")).await.unwrap(), DomainInsert::Duplicate(_)));
        assert!(matches!(store.insert_domain(domain("bob", "example.com")).await.unwrap(), DomainInsert::Inserted(_)));
    }

    #[tokio::test]
    async fn verification_flips_only_once() {
        let store = MemoryStore::new();
        let mut d = domain("alice", "example.com");
        d.is_verified = false;
        d.verified_at = None;
        let DomainInsert::Inserted(d) = store.insert_domain(d).await.unwrap() else { panic!() };

        let first_at = Utc::now();
        let (first, flipped) = store.mark_domain_verified(&d.id, VerificationMethod::MetaTag, first_at).await.unwrap();
        assert!(flipped);
        assert_eq!(first.verified_at, Some(first_at));

        let (second, flipped) = store
            .mark_domain_verified(&d.id, VerificationMethod::DnsTxt, first_at + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(!flipped);
        assert_eq!(second.verified_at, Some(first_at));
        assert_eq!(second.verification_method, Some(VerificationMethod::MetaTag));
    }

    #[tokio::test]
    async fn only_one_active_scan_per_domain() {
        let store = MemoryStore::new();
        let d = domain("alice", "example.com");
        let ScanAdmission::Admitted(first) = store.insert_scan_if_idle(Scan::new(&d, true)).await.unwrap() else {
            panic!()
        };
        match store.insert_scan_if_idle(Scan::new(&d, true)).await.unwrap() {
            ScanAdmission::Conflict(active) => assert_eq!(active.id, first.id),
            ScanAdmission::Admitted(_) => panic!("second scan must be refused"),
        }

        store
            .transition_scan(&first.id, &ScanStatus::ACTIVE, StatusChange::to(ScanStatus::Cancelled))
            .await
            .unwrap();
        assert!(matches!(store.insert_scan_if_idle(Scan::new(&d, true)).await.unwrap(), ScanAdmission::Admitted(_)));
        assert_eq!(store.scans_for_domain(&d.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn guarded_transitions_reject_wrong_source_state() {
        let store = MemoryStore::new();
        let scan = running_scan(&store).await;
        assert!(scan.started_at.is_some());

        let done = store
            .transition_scan(&scan.id, &ScanStatus::ACTIVE, StatusChange::to(ScanStatus::Cancelled))
            .await
            .unwrap();
        let Transition::Applied(cancelled) = done else { panic!() };
        assert!(cancelled.completed_at.is_some());

        let again = store
            .transition_scan(&scan.id, &ScanStatus::ACTIVE, StatusChange::to(ScanStatus::Cancelled))
            .await
            .unwrap();
        assert!(matches!(again, Transition::Rejected(s) if s.status == ScanStatus::Cancelled));
    }

    #[tokio::test]
    async fn stale_commit_discards_findings() {
        let store = MemoryStore::new();
        let scan = running_scan(&store).await;

        let commit = |index| StepCommit {
            expected_index: index,
            findings: vec![finding(&scan.id)],
            progress: 16,
            completed: false,
        };
        assert!(matches!(store.commit_step(&scan.id, commit(0)).await.unwrap(), CommitOutcome::Applied(_)));
        assert!(matches!(store.commit_step(&scan.id, commit(0)).await.unwrap(), CommitOutcome::Stale(_)));

        assert_eq!(store.findings(&scan.id).await.unwrap().len(), 1);
        assert_eq!(store.get_scan(&scan.id).await.unwrap().unwrap().current_step_index, 1);
    }

    #[tokio::test]
    async fn last_commit_completes_unless_cancelled() {
        let store = MemoryStore::new();
        let scan = running_scan(&store).await;
        let last = StepCommit { expected_index: 0, findings: vec![finding(&scan.id)], progress: 100, completed: true };
        let CommitOutcome::Applied(done) = store.commit_step(&scan.id, last.clone()).await.unwrap() else { panic!() };
        assert_eq!(done.status, ScanStatus::Completed);
        assert!(done.completed_at.is_some());

        let other = running_scan(&store).await;
        store
            .transition_scan(&other.id, &ScanStatus::ACTIVE, StatusChange::to(ScanStatus::Cancelled))
            .await
            .unwrap();
        let CommitOutcome::Applied(kept) = store.commit_step(&other.id, last).await.unwrap() else { panic!() };
        assert_eq!(kept.status, ScanStatus::Cancelled);
        assert_eq!(store.findings(&other.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_terminal_scans_are_deleted_with_their_findings() {
        let store = MemoryStore::new();
        let scan = running_scan(&store).await;
        let commit = StepCommit { expected_index: 0, findings: vec![finding(&scan.id)], progress: 16, completed: false };
        store.commit_step(&scan.id, commit).await.unwrap();

        assert!(matches!(
            store.delete_scan_if_terminal(&scan.id).await.unwrap(),
            Deletion::Rejected(ScanStatus::Running)
        ));

        store
            .transition_scan(&scan.id, &ScanStatus::ACTIVE, StatusChange::to(ScanStatus::Cancelled))
            .await
            .unwrap();
        assert!(matches!(store.delete_scan_if_terminal(&scan.id).await.unwrap(), Deletion::Deleted));
        assert!(store.get_scan(&scan.id).await.unwrap().is_none());
        assert!(store.findings(&scan.id).await.unwrap().is_empty());
        assert!(matches!(store.delete_scan_if_terminal(&scan.id).await, Err(Error::NotFound { .. })));
    }
}
