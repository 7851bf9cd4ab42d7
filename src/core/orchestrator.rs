// src/core/orchestrator.rs

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::core::catalog;
use crate::core::error::{Error, Result};
use crate::core::executor::StepExecutor;
use crate::core::models::{Domain, Scan, ScanStatus, ScanSummary, StepOutcome};
use crate::core::scoring;
use crate::core::store::{Deletion, FindingStore, ScanAdmission, StatusChange, Transition};

/// Progress reported by a drain task.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Step(StepOutcome),
    Finished { scan_id: String, status: ScanStatus },
    Failed { scan_id: String, message: String },
}

/// Cancellation tokens of the drain tasks currently running, by scan id.
type DrainQueue = Arc<Mutex<HashMap<String, watch::Sender<bool>>>>;

/// Owns the scan lifecycle: admission, stepping, cancellation, deletion, and
/// background draining of a scan one step at a time.
pub struct ScanOrchestrator {
    store: Arc<dyn FindingStore>,
    executor: Arc<StepExecutor>,
    drains: DrainQueue,
}

impl ScanOrchestrator {
    pub fn new(store: Arc<dyn FindingStore>, executor: StepExecutor) -> Self {
        Self { store, executor: Arc::new(executor), drains: Arc::default() }
    }

    /// Admits a new scan of a verified domain owned by `owner_id`.
    pub async fn start(&self, owner_id: &str, domain_id: &str, consent_given: bool) -> Result<Scan> {
        if !consent_given {
            return Err(Error::ConsentRequired);
        }
        let domain = owned_domain(self.store.as_ref(), owner_id, domain_id).await?;
        if !domain.is_verified {
            return Err(Error::DomainNotVerified(domain.name));
        }

        match self.store.insert_scan_if_idle(Scan::new(&domain, consent_given)).await? {
            ScanAdmission::Admitted(scan) => {
                info!(scan_id = %scan.id, domain = %domain.name, "Scan created.");
                Ok(scan)
            }
            ScanAdmission::Conflict(active) => {
                warn!(domain = %domain.name, active_scan = %active.id, "Refusing second active scan.");
                Err(Error::ActiveScanExists { scan_id: active.id })
            }
        }
    }

    /// Runs the next pending step of the scan.
    pub async fn execute_step(&self, owner_id: &str, scan_id: &str) -> Result<StepOutcome> {
        let scan = owned_scan(self.store.as_ref(), owner_id, scan_id).await?;
        let domain = self.domain_of(&scan).await?;
        self.executor.execute_step(scan_id, &domain.name).await
    }

    /// Cancels a pending or running scan and stops its drain task before the next step.
    pub async fn cancel(&self, owner_id: &str, scan_id: &str) -> Result<Scan> {
        owned_scan(self.store.as_ref(), owner_id, scan_id).await?;

        let change = StatusChange::to(ScanStatus::Cancelled);
        match self.store.transition_scan(scan_id, &ScanStatus::ACTIVE, change).await? {
            Transition::Applied(scan) => {
                if let Some(token) = self.drains.lock().await.get(scan_id) {
                    // The receiver may already be gone if the drain just finished.
                    let _ = token.send(true);
                }
                info!(scan_id, "Scan cancelled.");
                Ok(scan)
            }
            Transition::Rejected(scan) => Err(Error::invalid_state(&scan.id, scan.status, "cancel")),
        }
    }

    /// Deletes a terminal scan and its findings.
    pub async fn delete(&self, owner_id: &str, scan_id: &str) -> Result<()> {
        owned_scan(self.store.as_ref(), owner_id, scan_id).await?;
        match self.store.delete_scan_if_terminal(scan_id).await? {
            Deletion::Deleted => {
                info!(scan_id, "Scan deleted.");
                Ok(())
            }
            Deletion::Rejected(status) => Err(Error::invalid_state(scan_id, status, "delete")),
        }
    }

    /// Drains the scan in a background task, one step per iteration, until it is
    /// terminal or cancelled. Returns `false` if a drain for this scan is already
    /// running; the caller then simply keeps listening.
    pub async fn run(&self, owner_id: &str, scan_id: &str, progress: mpsc::Sender<ScanEvent>) -> Result<bool> {
        let scan = owned_scan(self.store.as_ref(), owner_id, scan_id).await?;
        if scan.status.is_terminal() {
            return Err(Error::invalid_state(&scan.id, scan.status, "run"));
        }
        let domain = self.domain_of(&scan).await?;

        let (token, mut cancelled) = watch::channel(false);
        {
            let mut drains = self.drains.lock().await;
            if drains.contains_key(scan_id) {
                debug!(scan_id, "Drain already running.");
                return Ok(false);
            }
            drains.insert(scan_id.to_string(), token);
        }

        let executor = self.executor.clone();
        let drains = self.drains.clone();
        let scan_id = scan_id.to_string();
        info!(scan_id = %scan_id, domain = %domain.name, "Starting scan drain.");

        tokio::spawn(async move {
            loop {
                // A step already in flight finishes and commits; only the next one is skipped.
                if *cancelled.borrow_and_update() {
                    info!(scan_id = %scan_id, "Drain stopped by cancellation.");
                    let _ = progress
                        .send(ScanEvent::Finished { scan_id: scan_id.clone(), status: ScanStatus::Cancelled })
                        .await;
                    break;
                }

                match executor.execute_step(&scan_id, &domain.name).await {
                    Ok(outcome) => {
                        let done = outcome.completed;
                        let status = outcome.status;
                        let _ = progress.send(ScanEvent::Step(outcome)).await;
                        if done {
                            let _ = progress.send(ScanEvent::Finished { scan_id: scan_id.clone(), status }).await;
                            break;
                        }
                    }
                    Err(e) => {
                        if e.is_rejection() {
                            debug!(scan_id = %scan_id, error = %e, "Drain stopped, scan no longer runnable.");
                        } else {
                            warn!(scan_id = %scan_id, error = %e, "Drain ended with an error.");
                        }
                        let _ = progress
                            .send(ScanEvent::Failed { scan_id: scan_id.clone(), message: e.to_string() })
                            .await;
                        break;
                    }
                }
            }
            drains.lock().await.remove(&scan_id);
        });

        Ok(true)
    }

    /// The scan, its findings and a score over the categories already assessed.
    pub async fn summary(&self, owner_id: &str, scan_id: &str) -> Result<ScanSummary> {
        let scan = owned_scan(self.store.as_ref(), owner_id, scan_id).await?;
        let domain = self.domain_of(&scan).await?;
        let findings = self.store.findings(scan_id).await?;

        let assessed = scan.current_step_index.min(catalog::step_count());
        let score = scoring::score(&findings, assessed);

        Ok(ScanSummary {
            scan,
            domain_name: domain.name,
            steps: catalog::steps().to_vec(),
            findings,
            score,
        })
    }

    async fn domain_of(&self, scan: &Scan) -> Result<Domain> {
        self.store
            .get_domain(&scan.domain_id)
            .await?
            .ok_or_else(|| Error::not_found("Domain", &scan.domain_id))
    }
}

/// Loads a domain, refusing callers other than its owner.
pub(crate) async fn owned_domain(store: &dyn FindingStore, owner_id: &str, domain_id: &str) -> Result<Domain> {
    let domain = store
        .get_domain(domain_id)
        .await?
        .ok_or_else(|| Error::not_found("Domain", domain_id))?;
    if domain.owner_id != owner_id {
        return Err(Error::not_owner("Domain", domain_id));
    }
    Ok(domain)
}

/// Loads a scan, refusing callers other than its owner.
pub(crate) async fn owned_scan(store: &dyn FindingStore, owner_id: &str, scan_id: &str) -> Result<Scan> {
    let scan = store
        .get_scan(scan_id)
        .await?
        .ok_or_else(|| Error::not_found("Scan", scan_id))?;
    if scan.owner_id != owner_id {
        return Err(Error::not_owner("Scan", scan_id));
    }
    Ok(scan)
}
