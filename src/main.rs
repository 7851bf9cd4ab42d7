// src/main.rs

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use vanguard_rs_sentinel::config::Config;
use vanguard_rs_sentinel::core::models::VerificationMethod;
use vanguard_rs_sentinel::{logging, Error, Sentinel};

mod app;
mod ui;

use app::{App, AppEvent, AppState, LOCAL_OWNER};

const TICK_RATE: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    logging::initialize_logging()?;

    let config = Config::load_or_default();
    let sentinel = Arc::new(Sentinel::with_network(config)?);
    info!("Vanguard RS Sentinel started.");

    // --- Setup ---
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut app = App::new();
    let (tx, mut rx) = mpsc::channel::<AppEvent>(32);

    let outcome = run(&mut terminal, &mut app, &sentinel, &tx, &mut rx).await;

    // --- Restore Terminal ---
    stdout().execute(LeaveAlternateScreen)?;
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;

    info!("Vanguard RS Sentinel stopped.");
    outcome
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    sentinel: &Arc<Sentinel>,
    tx: &mpsc::Sender<AppEvent>,
    rx: &mut mpsc::Receiver<AppEvent>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key, sentinel, tx);
                }
            }
        }

        while let Ok(update) = rx.try_recv() {
            app.apply(update);
        }
        app.on_tick();
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent, sentinel: &Arc<Sentinel>, tx: &mpsc::Sender<AppEvent>) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.quit();
        return;
    }

    match app.state {
        AppState::Disclaimer => match key.code {
            KeyCode::Enter => app.acknowledge_disclaimer(),
            KeyCode::Esc | KeyCode::Char('q') => app.quit(),
            _ => {}
        },
        AppState::Idle => match key.code {
            KeyCode::Esc => app.quit(),
            KeyCode::Char(c) => app.input.push(c),
            KeyCode::Backspace => {
                app.input.pop();
            }
            KeyCode::Enter if !app.input.trim().is_empty() && !app.busy => submit_domain(app, sentinel, tx),
            _ => {}
        },
        AppState::Verifying => match key.code {
            KeyCode::Char('1') => verify(app, VerificationMethod::DnsTxt, sentinel, tx),
            KeyCode::Char('2') => verify(app, VerificationMethod::HtmlFile, sentinel, tx),
            KeyCode::Char('3') => verify(app, VerificationMethod::MetaTag, sentinel, tx),
            KeyCode::Char('s') => start_scan(app, sentinel, tx),
            KeyCode::Char('n') => app.reset(),
            KeyCode::Char('q') => app.quit(),
            _ => {}
        },
        AppState::Scanning => match key.code {
            KeyCode::Char('c') => cancel_scan(app, sentinel, tx),
            KeyCode::Char('l') => app.toggle_logs(),
            KeyCode::Left => app.scroll_logs_left(),
            KeyCode::Right => app.scroll_logs_right(),
            KeyCode::Char('q') => app.quit(),
            _ => {}
        },
        AppState::Finished => match key.code {
            KeyCode::Up => app.scroll_up(),
            KeyCode::Down => app.scroll_down(),
            KeyCode::Left => app.scroll_logs_left(),
            KeyCode::Right => app.scroll_logs_right(),
            KeyCode::Char('l') => app.toggle_logs(),
            KeyCode::Char('r') => start_scan(app, sentinel, tx),
            KeyCode::Char('n') => app.reset(),
            KeyCode::Char('q') => app.quit(),
            _ => {}
        },
    }
}

/// Error text shown in the footer, with a hint when there is one.
fn describe(e: &Error) -> String {
    match e.suggestion() {
        Some(hint) => format!("{}. {}", e, hint),
        None => e.to_string(),
    }
}

fn submit_domain(app: &mut App, sentinel: &Arc<Sentinel>, tx: &mpsc::Sender<AppEvent>) {
    app.busy = true;
    let sentinel = sentinel.clone();
    let tx = tx.clone();
    let raw_input = app.input.trim().to_string();

    tokio::spawn(async move {
        let domain = match sentinel.create_domain(LOCAL_OWNER, &raw_input).await {
            Ok(domain) => Ok(domain),
            // Entering a known name again resumes it.
            Err(Error::DomainAlreadyRegistered { domain_id, .. }) => sentinel.get_domain(LOCAL_OWNER, &domain_id).await,
            Err(e) => Err(e),
        };
        let ready = match domain {
            Ok(domain) => sentinel
                .verification_instructions(LOCAL_OWNER, &domain.id)
                .await
                .map(|instructions| AppEvent::DomainReady { domain, instructions }),
            Err(e) => Err(e),
        };
        let _ = tx.send(ready.unwrap_or_else(|e| AppEvent::Error(describe(&e)))).await;
    });
}

fn verify(app: &mut App, method: VerificationMethod, sentinel: &Arc<Sentinel>, tx: &mpsc::Sender<AppEvent>) {
    let Some(domain) = app.domain.as_ref() else { return };
    if app.busy {
        return;
    }
    app.busy = true;
    app.status_message = None;
    let sentinel = sentinel.clone();
    let tx = tx.clone();
    let domain_id = domain.id.clone();

    tokio::spawn(async move {
        let update = match sentinel.verify_domain(LOCAL_OWNER, &domain_id, method).await {
            Ok(report) => AppEvent::Verification(report),
            Err(e) => AppEvent::Error(describe(&e)),
        };
        let _ = tx.send(update).await;
    });
}

fn start_scan(app: &mut App, sentinel: &Arc<Sentinel>, tx: &mpsc::Sender<AppEvent>) {
    let Some(domain) = app.domain.as_ref() else { return };
    if app.busy {
        return;
    }
    app.busy = true;
    let sentinel = sentinel.clone();
    let tx = tx.clone();
    let domain_id = domain.id.clone();
    let consent_given = app.consent_given;

    tokio::spawn(async move {
        let scan = match sentinel.create_scan(LOCAL_OWNER, &domain_id, consent_given).await {
            Ok(scan) => scan,
            Err(e) => {
                let _ = tx.send(AppEvent::Error(describe(&e))).await;
                return;
            }
        };
        let scan_id = scan.id.clone();
        let _ = tx.send(AppEvent::ScanStarted(scan)).await;

        let (progress_tx, mut progress_rx) = mpsc::channel(16);
        if let Err(e) = sentinel.run_scan(LOCAL_OWNER, &scan_id, progress_tx).await {
            error!(scan_id = %scan_id, error = %e, "Could not start scan drain.");
            let _ = tx.send(AppEvent::Error(describe(&e))).await;
            return;
        }

        // Forward each step and refresh the partial score after it.
        while let Some(event) = progress_rx.recv().await {
            if tx.send(AppEvent::Scan(event)).await.is_err() {
                break;
            }
            match sentinel.get_scan_summary(LOCAL_OWNER, &scan_id).await {
                Ok(summary) => {
                    let _ = tx.send(AppEvent::Summary(summary)).await;
                }
                Err(e) => {
                    let _ = tx.send(AppEvent::Error(describe(&e))).await;
                }
            }
        }
    });
}

fn cancel_scan(app: &mut App, sentinel: &Arc<Sentinel>, tx: &mpsc::Sender<AppEvent>) {
    let Some(scan) = app.scan.as_ref() else { return };
    let sentinel = sentinel.clone();
    let tx = tx.clone();
    let scan_id = scan.id.clone();
    app.status_message = Some("Cancelling after the current step...".to_string());

    tokio::spawn(async move {
        if let Err(e) = sentinel.cancel_scan(LOCAL_OWNER, &scan_id).await {
            let _ = tx.send(AppEvent::Error(describe(&e))).await;
        }
    });
}
