//! The fixed, ordered catalog of check categories a scan walks through.
//!
//! Each entry is executed by exactly one step invocation, so the order here is
//! also the order in which a scan's progress advances.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The high-level groups of probes. Findings are scored per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    /// TLS certificate and HTTP to HTTPS redirection.
    Transport,
    /// HTTP response security headers.
    Headers,
    /// Attributes of cookies set by the site.
    Cookies,
    /// Version banners and publicly reachable sensitive files.
    Disclosure,
    /// HTML forms and mixed-content resources on the landing page.
    Forms,
    /// Email and certificate-issuance DNS records.
    Dns,
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckCategory::Transport => write!(f, "Transport Security"),
            CheckCategory::Headers => write!(f, "HTTP Security Headers"),
            CheckCategory::Cookies => write!(f, "Cookie Security"),
            CheckCategory::Disclosure => write!(f, "Information Disclosure"),
            CheckCategory::Forms => write!(f, "Forms & Input Exposure"),
            CheckCategory::Dns => write!(f, "DNS & Email Security"),
        }
    }
}

/// An immutable catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckStep {
    pub index: usize,
    pub name: &'static str,
    pub category: CheckCategory,
}

/// Every scan executes these steps in order, one per invocation.
pub static SCAN_STEPS: &[CheckStep] = &[
    CheckStep { index: 0, name: "TLS certificate & HTTPS redirect", category: CheckCategory::Transport },
    CheckStep { index: 1, name: "Security headers", category: CheckCategory::Headers },
    CheckStep { index: 2, name: "Cookie attributes", category: CheckCategory::Cookies },
    CheckStep { index: 3, name: "Banners & exposed files", category: CheckCategory::Disclosure },
    CheckStep { index: 4, name: "Forms & mixed content", category: CheckCategory::Forms },
    CheckStep { index: 5, name: "DNS email & CAA records", category: CheckCategory::Dns },
];

pub fn steps() -> &'static [CheckStep] {
    SCAN_STEPS
}

pub fn step_count() -> usize {
    SCAN_STEPS.len()
}

pub fn step_at(index: usize) -> Option<&'static CheckStep> {
    SCAN_STEPS.get(index)
}

/// Categories whose step index is below `assessed_steps`, i.e. already executed.
pub fn assessed_categories(assessed_steps: usize) -> impl Iterator<Item = CheckCategory> {
    SCAN_STEPS.iter().take(assessed_steps).map(|s| s.category)
}

/// Progress percentage after `completed_steps` steps have been committed.
pub fn progress_for(completed_steps: usize) -> u8 {
    let total = step_count();
    if total == 0 || completed_steps >= total {
        return 100;
    }
    ((completed_steps * 100) / total) as u8
}
