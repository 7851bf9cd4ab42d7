// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::core::catalog::{CheckCategory, CheckStep};

/// Generates a fresh opaque identifier for domains, scans and findings.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// --- Severity ---

/// Ordinal risk level of a finding. The declaration order is the display order,
/// most severe first.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
    Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

// --- Domain & Verification ---

/// The three supported ownership proofs.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
    EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationMethod {
    DnsTxt,
    HtmlFile,
    MetaTag,
}

/// A website hostname registered by an owner. It cannot be scanned until
/// `is_verified` is true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Domain {
    pub id: String,
    pub owner_id: String,
    /// Normalized hostname: lowercase, no scheme, path, port or trailing dot.
    pub name: String,
    /// Issued once at creation and never rotated.
    pub verification_token: String,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub verification_method: Option<VerificationMethod>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Failed,
}

/// One row of the append-only verification audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationAttempt {
    pub domain_id: String,
    pub method: VerificationMethod,
    pub status: VerificationStatus,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// What `verify_domain` hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verified: bool,
    pub method: VerificationMethod,
    pub diagnostic: Option<String>,
}

// --- Scan ---

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    pub const ACTIVE: [ScanStatus; 2] = [ScanStatus::Pending, ScanStatus::Running];

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// One execution of the check catalog against a verified domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scan {
    pub id: String,
    pub domain_id: String,
    pub owner_id: String,
    pub status: ScanStatus,
    /// Percentage of catalog steps already committed, 0 to 100.
    pub progress: u8,
    /// Index of the next catalog step to run. Equal to the catalog length once
    /// every step has been committed.
    pub current_step_index: usize,
    pub consent_given: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Scan {
    pub fn new(domain: &Domain, consent_given: bool) -> Self {
        Self {
            id: new_id(),
            domain_id: domain.id.clone(),
            owner_id: domain.owner_id.clone(),
            status: ScanStatus::Pending,
            progress: 0,
            current_step_index: 0,
            consent_given,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }
}

/// Returned by every step invocation so the caller knows whether to call again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepOutcome {
    pub scan_id: String,
    pub completed: bool,
    /// The step this invocation ran, or the cursor position when nothing ran.
    pub current_step: usize,
    pub next_step: Option<usize>,
    pub progress: u8,
    pub status: ScanStatus,
    /// Number of findings persisted by this invocation.
    pub new_findings: usize,
}

// --- Findings ---

/// Raw output of a single probe: a knowledge base code plus the context in which
/// it was observed. Severity, title and remediation come from the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisFinding {
    pub code: String,
    pub affected_url: Option<String>,
    pub evidence: Option<String>,
}

impl AnalysisFinding {
    pub fn new(code: &str) -> Self {
        Self { code: code.to_string(), affected_url: None, evidence: None }
    }

    pub fn at(mut self, url: impl Into<String>) -> Self {
        self.affected_url = Some(url.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// A persisted, append-only issue discovered during a scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub id: String,
    pub scan_id: String,
    pub category: CheckCategory,
    pub severity: Severity,
    pub code: String,
    pub title: String,
    pub description: String,
    pub affected_url: Option<String>,
    pub recommendation: String,
    pub created_at: DateTime<Utc>,
}

// --- Score Summary ---

/// Finding counts per severity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Info => self.info,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryScore {
    pub category: CheckCategory,
    /// `None` while the category's step has not run yet, or when it ran but
    /// some of its probes could not finish.
    pub score: Option<u8>,
    /// The step ran but did not cover everything it checks.
    pub incomplete: bool,
    pub counts: SeverityCounts,
}

impl CategoryScore {
    pub fn is_assessed(&self) -> bool {
        self.score.is_some()
    }
}

/// Derived view over a finding set. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreSummary {
    pub total_findings: usize,
    pub counts_by_severity: SeverityCounts,
    pub category_scores: Vec<CategoryScore>,
    pub overall_score: u8,
    pub rating: String,
}

/// Everything a caller needs to render one scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scan: Scan,
    pub domain_name: String,
    pub steps: Vec<CheckStep>,
    pub findings: Vec<Finding>,
    pub score: ScoreSummary,
}
