// src/app.rs

use ratatui::widgets::{ListState, ScrollbarState};
use vanguard_rs_sentinel::core::models::{
    Domain, Finding, Scan, ScanStatus, ScanSummary, StepOutcome, VerificationMethod, VerificationReport,
};
use vanguard_rs_sentinel::core::orchestrator::ScanEvent;

pub const SPINNER_CHARS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// The single local operator every engine call is made on behalf of.
pub const LOCAL_OWNER: &str = "local-operator";

pub enum AppState {
    /// Consent popup; nothing can be scanned before it is acknowledged.
    Disclaimer,
    Idle,
    Verifying,
    Scanning,
    Finished,
}

/// Results of background tasks, delivered to the main loop.
pub enum AppEvent {
    DomainReady { domain: Domain, instructions: Vec<(VerificationMethod, String)> },
    Verification(VerificationReport),
    ScanStarted(Scan),
    Scan(ScanEvent),
    Summary(ScanSummary),
    Error(String),
}

pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub consent_given: bool,
    pub input: String,
    pub domain: Option<Domain>,
    pub instructions: Vec<(VerificationMethod, String)>,
    pub last_verification: Option<VerificationReport>,
    /// A background request is in flight.
    pub busy: bool,
    pub scan: Option<Scan>,
    pub last_step: Option<StepOutcome>,
    pub summary: Option<ScanSummary>,
    pub status_message: Option<String>,
    pub analysis_list_state: ListState,
    pub spinner_frame: usize,
    pub show_logs: bool,
    pub log_content: Vec<String>,
    pub log_horizontal_scroll: usize,
    pub log_horizontal_scroll_state: ScrollbarState,
}

impl App {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            state: AppState::Disclaimer,
            consent_given: false,
            input: String::new(),
            domain: None,
            instructions: Vec::new(),
            last_verification: None,
            busy: false,
            scan: None,
            last_step: None,
            summary: None,
            status_message: None,
            analysis_list_state: ListState::default(),
            spinner_frame: 0,
            show_logs: false,
            log_content: Vec::new(),
            log_horizontal_scroll: 0,
            log_horizontal_scroll_state: ScrollbarState::default(),
        }
    }

    pub fn on_tick(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_CHARS.len();
        if self.show_logs {
            self.log_content = vanguard_rs_sentinel::logging::tail_log(200);
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn acknowledge_disclaimer(&mut self) {
        self.consent_given = true;
        self.state = AppState::Idle;
    }

    /// Applies the result of a background task.
    pub fn apply(&mut self, event: AppEvent) {
        self.busy = false;
        match event {
            AppEvent::DomainReady { domain, instructions } => {
                self.status_message = None;
                self.domain = Some(domain);
                self.instructions = instructions;
                self.last_verification = None;
                self.state = AppState::Verifying;
            }
            AppEvent::Verification(report) => {
                if let Some(domain) = self.domain.as_mut() {
                    domain.is_verified |= report.verified;
                }
                self.last_verification = Some(report);
            }
            AppEvent::ScanStarted(scan) => {
                self.status_message = None;
                self.scan = Some(scan);
                self.last_step = None;
                self.summary = None;
                self.analysis_list_state = ListState::default();
                self.state = AppState::Scanning;
            }
            AppEvent::Scan(ScanEvent::Step(outcome)) => {
                self.busy = true;
                self.last_step = Some(outcome);
            }
            AppEvent::Scan(ScanEvent::Finished { status, .. }) => {
                if let Some(scan) = self.scan.as_mut() {
                    scan.status = status;
                }
            }
            AppEvent::Scan(ScanEvent::Failed { message, .. }) => {
                if let Some(scan) = self.scan.as_mut() {
                    scan.status = ScanStatus::Failed;
                }
                self.status_message = Some(message);
            }
            AppEvent::Summary(summary) => {
                let finished = summary.scan.status.is_terminal();
                self.scan = Some(summary.scan.clone());
                self.summary = Some(summary);
                if finished {
                    self.state = AppState::Finished;
                    if !self.findings().is_empty() && self.analysis_list_state.selected().is_none() {
                        self.analysis_list_state.select(Some(0));
                    }
                } else {
                    self.busy = true;
                }
            }
            AppEvent::Error(message) => self.status_message = Some(message),
        }
    }

    /// Findings of the current summary, most severe first.
    pub fn findings(&self) -> Vec<&Finding> {
        let mut findings: Vec<&Finding> = self.summary.iter().flat_map(|s| s.findings.iter()).collect();
        findings.sort_by_key(|f| (f.severity, f.category.to_string()));
        findings
    }

    pub fn selected_finding(&self) -> Option<&Finding> {
        let index = self.analysis_list_state.selected()?;
        self.findings().get(index).copied()
    }

    pub fn scroll_up(&mut self) {
        let selected = self.analysis_list_state.selected().unwrap_or(0);
        self.analysis_list_state.select(Some(selected.saturating_sub(1)));
    }

    pub fn scroll_down(&mut self) {
        let count = self.findings().len();
        if count == 0 {
            return;
        }
        let next = self.analysis_list_state.selected().map_or(0, |i| (i + 1).min(count - 1));
        self.analysis_list_state.select(Some(next));
    }

    pub fn toggle_logs(&mut self) {
        self.show_logs = !self.show_logs;
        if self.show_logs {
            self.log_content = vanguard_rs_sentinel::logging::tail_log(200);
        }
    }

    pub fn scroll_logs_left(&mut self) {
        self.log_horizontal_scroll = self.log_horizontal_scroll.saturating_sub(4);
        self.log_horizontal_scroll_state = self.log_horizontal_scroll_state.position(self.log_horizontal_scroll);
    }

    pub fn scroll_logs_right(&mut self) {
        self.log_horizontal_scroll = self.log_horizontal_scroll.saturating_add(4);
        self.log_horizontal_scroll_state = self.log_horizontal_scroll_state.position(self.log_horizontal_scroll);
    }

    /// Back to the domain prompt. Consent, once given, is kept.
    pub fn reset(&mut self) {
        let consent_given = self.consent_given;
        let show_logs = self.show_logs;
        *self = Self::new();
        self.consent_given = consent_given;
        self.show_logs = show_logs;
        self.state = if consent_given { AppState::Idle } else { AppState::Disclaimer };
    }
}
