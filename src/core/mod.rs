// src/core/mod.rs

// The assessment engine. Nothing in here touches the terminal; the TUI in
// `crate::ui` only talks to `service::Sentinel`.

/// Domain, scan, finding and score data structures.
pub mod models;

/// The fixed, ordered list of check categories a scan walks through.
pub mod catalog;

pub mod domain;
pub mod error;

/// Ownership proofs: DNS TXT record, well-known file and meta tag.
pub mod verifier;

/// Network probes for each check category.
pub mod scanner;

/// Static repository of finding codes with their severity, explanation and remediation.
pub mod knowledge_base;

pub mod scoring;
pub mod store;
pub mod executor;
pub mod orchestrator;
pub mod service;
