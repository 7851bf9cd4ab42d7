// src/ui/mod.rs

use crate::app::{App, AppState};
use ratatui::prelude::*;

mod layout;
mod widgets;

pub fn render(app: &mut App, frame: &mut Frame) {
    let layout = layout::create_layout(frame.area(), app.show_logs);

    widgets::input::render_input(frame, app, layout.input);

    match app.state {
        AppState::Verifying => widgets::verification_view::render_verification_view(frame, app, layout.main),
        AppState::Scanning => widgets::scan_progress::render_scan_progress(frame, app, layout.main),
        _ => widgets::analysis_view::render_analysis_view(frame, app, layout.main),
    }

    widgets::summary::render_summary(frame, app, layout.summary);
    if app.show_logs {
        widgets::log_view::render_log_view(frame, app, layout.log_panel);
    }
    widgets::footer::render_footer(frame, app, layout.footer);

    // The consent popup sits on top of everything until acknowledged.
    if let AppState::Disclaimer = app.state {
        widgets::disclaimer_popup::render_disclaimer_popup(frame, frame.area());
    }
}
