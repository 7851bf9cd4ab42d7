// src/core/executor.rs

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::catalog;
use crate::core::error::{Error, Result};
use crate::core::knowledge_base;
use crate::core::models::{Finding, Scan, ScanStatus, StepOutcome};
use crate::core::scanner::CheckRunner;
use crate::core::store::{CommitOutcome, FindingStore, StatusChange, StepCommit, Transition};

/// Runs exactly one pending catalog step per invocation and commits it with a
/// compare-and-advance on the scan cursor. Safe to call repeatedly and
/// concurrently: a terminal scan is left untouched and a stale commit is dropped.
pub struct StepExecutor {
    store: Arc<dyn FindingStore>,
    runner: Arc<dyn CheckRunner>,
}

impl StepExecutor {
    pub fn new(store: Arc<dyn FindingStore>, runner: Arc<dyn CheckRunner>) -> Self {
        Self { store, runner }
    }

    pub async fn execute_step(&self, scan_id: &str, domain_name: &str) -> Result<StepOutcome> {
        let scan = self.load(scan_id).await?;
        if scan.status.is_terminal() {
            debug!(scan_id, status = %scan.status, "Scan is terminal, nothing to execute.");
            return Ok(outcome(&scan, scan.current_step_index, 0));
        }

        let scan = if scan.status == ScanStatus::Pending {
            match self
                .store
                .transition_scan(scan_id, &[ScanStatus::Pending], StatusChange::to(ScanStatus::Running))
                .await?
            {
                Transition::Applied(scan) => {
                    info!(scan_id, domain = domain_name, "Scan started.");
                    scan
                }
                // Another invocation started it, or it was cancelled meanwhile.
                Transition::Rejected(scan) if scan.status.is_terminal() => {
                    return Ok(outcome(&scan, scan.current_step_index, 0));
                }
                Transition::Rejected(scan) => scan,
            }
        } else {
            scan
        };

        let index = scan.current_step_index;
        let Some(step) = catalog::step_at(index) else {
            // Every step is committed but the scan never closed; close it now.
            warn!(scan_id, index, "Cursor past the catalog on a running scan, completing it.");
            let closed = match self
                .store
                .transition_scan(scan_id, &[ScanStatus::Running], StatusChange::to(ScanStatus::Completed))
                .await?
            {
                Transition::Applied(scan) | Transition::Rejected(scan) => scan,
            };
            return Ok(outcome(&closed, index, 0));
        };

        info!(scan_id, step = step.name, index, "Executing scan step.");
        let analyses = match self.runner.run(step, domain_name).await {
            Ok(analyses) => analyses,
            Err(e) => return Err(self.fail(scan_id, step.name, e).await),
        };

        let findings: Vec<Finding> = analyses
            .iter()
            .map(|analysis| knowledge_base::materialize(scan_id, step.category, analysis))
            .collect();
        let new_findings = findings.len();
        let completed_steps = index + 1;

        let commit = StepCommit {
            expected_index: index,
            findings,
            progress: catalog::progress_for(completed_steps),
            completed: completed_steps >= catalog::step_count(),
        };

        match self.store.commit_step(scan_id, commit).await? {
            CommitOutcome::Applied(scan) => {
                info!(
                    scan_id,
                    step = step.name,
                    findings = new_findings,
                    progress = scan.progress,
                    status = %scan.status,
                    "Scan step committed."
                );
                Ok(outcome(&scan, index, new_findings))
            }
            CommitOutcome::Stale(scan) => {
                warn!(scan_id, step = step.name, "Step already committed by a concurrent invocation.");
                Ok(outcome(&scan, index, 0))
            }
        }
    }

    async fn load(&self, scan_id: &str) -> Result<Scan> {
        self.store
            .get_scan(scan_id)
            .await?
            .ok_or_else(|| Error::not_found("Scan", scan_id))
    }

    /// Marks the scan failed and builds the error handed back to the caller.
    async fn fail(&self, scan_id: &str, step_name: &str, cause: Error) -> Error {
        let message = format!("{} step failed: {}", step_name, cause);
        error!(scan_id, error = %cause, category = %cause.category(), step = step_name, "Unexpected check failure, failing scan.");

        let change = StatusChange::to(ScanStatus::Failed).with_error(message.clone());
        if let Err(e) = self.store.transition_scan(scan_id, &ScanStatus::ACTIVE, change).await {
            error!(scan_id, error = %e, "Could not record scan failure.");
        }
        Error::ScanFailed { scan_id: scan_id.to_string(), message }
    }
}

fn outcome(scan: &Scan, current_step: usize, new_findings: usize) -> StepOutcome {
    let completed = scan.status.is_terminal();
    let next_step = (!completed && scan.current_step_index < catalog::step_count()).then_some(scan.current_step_index);
    StepOutcome {
        scan_id: scan.id.clone(),
        completed,
        current_step,
        next_step,
        progress: scan.progress,
        status: scan.status,
        new_findings,
    }
}
