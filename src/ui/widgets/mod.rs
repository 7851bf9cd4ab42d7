// src/ui/widgets/mod.rs

// One module per screen region.
pub mod analysis_view;    // Findings list and details of a finished scan.
pub mod disclaimer_popup; // Ownership and consent acknowledgement.
pub mod footer;           // Key hints and status messages.
pub mod input;            // Target domain prompt.
pub mod log_view;         // Tail of the log file.
pub mod scan_progress;    // Step checklist and progress gauge.
pub mod summary;          // Overall and per-category scores.
pub mod verification_view; // Token, instructions and last diagnostic.
