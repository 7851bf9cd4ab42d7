// src/core/service.rs

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::catalog::{self, CheckStep};
use crate::core::domain::{generate_token, normalize_domain};
use crate::core::error::{Error, Result};
use crate::core::executor::StepExecutor;
use crate::core::models::{
    new_id, Domain, Scan, ScanSummary, StepOutcome, VerificationAttempt, VerificationMethod,
    VerificationReport, VerificationStatus,
};
use crate::core::orchestrator::{owned_domain, ScanEvent, ScanOrchestrator};
use crate::core::scanner::{CheckRunner, NetworkChecks};
use crate::core::store::{DomainInsert, FindingStore, MemoryStore};
use crate::core::verifier::{self, NetworkVerifier, OwnershipProbe, VerificationOutcome};

/// The engine's public surface. Every call names the owner it acts for.
pub struct Sentinel {
    config: Config,
    store: Arc<dyn FindingStore>,
    verifier: Arc<dyn OwnershipProbe>,
    orchestrator: ScanOrchestrator,
}

impl Sentinel {
    pub fn new(
        config: Config,
        store: Arc<dyn FindingStore>,
        verifier: Arc<dyn OwnershipProbe>,
        runner: Arc<dyn CheckRunner>,
    ) -> Self {
        let executor = StepExecutor::new(store.clone(), runner);
        let orchestrator = ScanOrchestrator::new(store.clone(), executor);
        Self { config, store, verifier, orchestrator }
    }

    /// Real network probes over an in-memory store.
    pub fn with_network(config: Config) -> Result<Self> {
        let verifier = Arc::new(NetworkVerifier::new(&config)?);
        let runner = Arc::new(NetworkChecks::new(&config)?);
        Ok(Self::new(config, Arc::new(MemoryStore::new()), verifier, runner))
    }

    // --- Domains ---

    /// Registers a hostname for `owner_id` and issues its verification token.
    pub async fn create_domain(&self, owner_id: &str, raw_input: &str) -> Result<Domain> {
        let name = normalize_domain(raw_input)?;
        let domain = Domain {
            id: new_id(),
            owner_id: owner_id.to_string(),
            name,
            verification_token: generate_token(&self.config.verification.token_prefix),
            is_verified: false,
            verified_at: None,
            verification_method: None,
            created_at: Utc::now(),
        };

        match self.store.insert_domain(domain).await? {
            DomainInsert::Inserted(domain) => {
                info!(domain = %domain.name, domain_id = %domain.id, "Domain registered.");
                Ok(domain)
            }
            DomainInsert::Duplicate(existing) => Err(Error::DomainAlreadyRegistered {
                name: existing.name,
                domain_id: existing.id,
            }),
        }
    }

    pub async fn get_domain(&self, owner_id: &str, domain_id: &str) -> Result<Domain> {
        owned_domain(self.store.as_ref(), owner_id, domain_id).await
    }

    /// Attempts one ownership proof. A domain that is already verified stays as
    /// it is: no probe runs and no attempt is recorded.
    pub async fn verify_domain(
        &self,
        owner_id: &str,
        domain_id: &str,
        method: VerificationMethod,
    ) -> Result<VerificationReport> {
        let domain = owned_domain(self.store.as_ref(), owner_id, domain_id).await?;
        if domain.is_verified {
            info!(domain = %domain.name, "Domain already verified.");
            return Ok(VerificationReport {
                verified: true,
                method: domain.verification_method.unwrap_or(method),
                diagnostic: None,
            });
        }

        let outcome = self.verifier.attempt(method, &domain.name, &domain.verification_token).await;
        let diagnostic = outcome.diagnostic();
        let status = match outcome {
            VerificationOutcome::Verified => VerificationStatus::Verified,
            VerificationOutcome::Failed(_) => VerificationStatus::Failed,
        };

        self.store
            .append_verification_attempt(VerificationAttempt {
                domain_id: domain.id.clone(),
                method,
                status,
                details: diagnostic.clone(),
                timestamp: Utc::now(),
            })
            .await?;

        if status == VerificationStatus::Verified {
            let (domain, flipped) = self.store.mark_domain_verified(&domain.id, method, Utc::now()).await?;
            if flipped {
                info!(domain = %domain.name, %method, "Domain ownership verified.");
            }
            return Ok(VerificationReport { verified: true, method, diagnostic: None });
        }

        warn!(domain = %domain.name, %method, "Domain verification failed.");
        Ok(VerificationReport { verified: false, method, diagnostic })
    }

    pub async fn verification_instructions(
        &self,
        owner_id: &str,
        domain_id: &str,
    ) -> Result<Vec<(VerificationMethod, String)>> {
        let domain = owned_domain(self.store.as_ref(), owner_id, domain_id).await?;
        Ok(verifier::instructions(&domain, &self.config.verification))
    }

    pub async fn verification_attempts(&self, owner_id: &str, domain_id: &str) -> Result<Vec<VerificationAttempt>> {
        owned_domain(self.store.as_ref(), owner_id, domain_id).await?;
        self.store.verification_attempts(domain_id).await
    }

    // --- Scans ---

    pub async fn create_scan(&self, owner_id: &str, domain_id: &str, consent_given: bool) -> Result<Scan> {
        self.orchestrator.start(owner_id, domain_id, consent_given).await
    }

    pub async fn execute_scan_step(&self, owner_id: &str, scan_id: &str) -> Result<StepOutcome> {
        self.orchestrator.execute_step(owner_id, scan_id).await
    }

    /// Drains the scan in the background, reporting each step on `progress`.
    pub async fn run_scan(&self, owner_id: &str, scan_id: &str, progress: mpsc::Sender<ScanEvent>) -> Result<bool> {
        self.orchestrator.run(owner_id, scan_id, progress).await
    }

    pub async fn cancel_scan(&self, owner_id: &str, scan_id: &str) -> Result<Scan> {
        self.orchestrator.cancel(owner_id, scan_id).await
    }

    pub async fn delete_scan(&self, owner_id: &str, scan_id: &str) -> Result<()> {
        self.orchestrator.delete(owner_id, scan_id).await
    }

    pub async fn get_scan_summary(&self, owner_id: &str, scan_id: &str) -> Result<ScanSummary> {
        self.orchestrator.summary(owner_id, scan_id).await
    }

    pub async fn scans_for_domain(&self, owner_id: &str, domain_id: &str) -> Result<Vec<Scan>> {
        owned_domain(self.store.as_ref(), owner_id, domain_id).await?;
        self.store.scans_for_domain(domain_id).await
    }

    pub fn check_steps(&self) -> &'static [CheckStep] {
        catalog::steps()
    }
}
