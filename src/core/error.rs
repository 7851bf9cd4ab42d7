//! Error types for the assessment engine.

use thiserror::Error;

use crate::core::models::ScanStatus;

/// Result type alias using the engine's error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // ===== Input Errors =====
    #[error("Invalid domain '{input}': {reason}")]
    InvalidDomain { input: String, reason: String },

    #[error("Scanning requires explicit consent from the domain owner")]
    ConsentRequired,

    // ===== Authorization Errors =====
    #[error("Domain {0} has not been verified yet")]
    DomainNotVerified(String),

    #[error("{resource} {id} does not belong to the caller")]
    NotOwner { resource: &'static str, id: String },

    // ===== Conflict Errors =====
    #[error("Domain {name} is already registered as {domain_id}")]
    DomainAlreadyRegistered { name: String, domain_id: String },

    #[error("Scan {scan_id} is already active for this domain")]
    ActiveScanExists { scan_id: String },

    #[error("Scan {scan_id} is {status}; {action} is not allowed in this state")]
    InvalidScanState {
        scan_id: String,
        status: ScanStatus,
        action: &'static str,
    },

    // ===== Lookup Errors =====
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    // ===== Execution Errors =====
    #[error("Scan {scan_id} failed: {message}")]
    ScanFailed { scan_id: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_domain(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDomain { input: input.into(), reason: reason.into() }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { resource, id: id.into() }
    }

    pub fn not_owner(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotOwner { resource, id: id.into() }
    }

    pub fn invalid_state(scan_id: impl Into<String>, status: ScanStatus, action: &'static str) -> Self {
        Self::InvalidScanState { scan_id: scan_id.into(), status, action }
    }

    /// Get the error category for logging and for mapping onto API responses.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidDomain { .. } | Error::ConsentRequired => ErrorCategory::Input,
            Error::DomainNotVerified(_) | Error::NotOwner { .. } => ErrorCategory::Authorization,
            Error::DomainAlreadyRegistered { .. }
            | Error::ActiveScanExists { .. }
            | Error::InvalidScanState { .. } => ErrorCategory::Conflict,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::ScanFailed { .. } | Error::Internal(_) => ErrorCategory::Fatal,
            Error::Storage(_) | Error::Json(_) => ErrorCategory::Storage,
            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::HttpClient(_) => {
                ErrorCategory::Configuration
            }
        }
    }

    /// True for errors rejected up front without touching any state.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Input
                | ErrorCategory::Authorization
                | ErrorCategory::Conflict
                | ErrorCategory::NotFound
        )
    }

    /// Get a user-facing hint for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::InvalidDomain { .. } => {
                Some("Enter a public hostname such as example.com, without path or port")
            }
            Error::ConsentRequired => Some("Confirm that you own the site and authorize the scan"),
            Error::DomainNotVerified(_) => {
                Some("Publish the verification token and run verification first")
            }
            Error::ActiveScanExists { .. } => {
                Some("Wait for the running scan to finish or cancel it")
            }
            Error::InvalidScanState { .. } => Some("Cancel the scan before deleting it"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Input,
    Authorization,
    Conflict,
    NotFound,
    Fatal,
    Storage,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "Input"),
            Self::Authorization => write!(f, "Authorization"),
            Self::Conflict => write!(f, "Conflict"),
            Self::NotFound => write!(f, "Not Found"),
            Self::Fatal => write!(f, "Fatal"),
            Self::Storage => write!(f, "Storage"),
            Self::Configuration => write!(f, "Configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_the_state() {
        let err = Error::invalid_state("s-1", ScanStatus::Running, "delete");
        assert_eq!(err.to_string(), "Scan s-1 is running; delete is not allowed in this state");
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(err.is_rejection());
    }

    #[test]
    fn fatal_errors_are_not_rejections() {
        let err = Error::ScanFailed { scan_id: "s-1".into(), message: "boom".into() };
        assert_eq!(err.category(), ErrorCategory::Fatal);
        assert!(!err.is_rejection());
    }
}
