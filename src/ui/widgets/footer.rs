// src/ui/widgets/footer.rs

use crate::app::{App, AppState};
use ratatui::{
    prelude::*,
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::Paragraph,
};

fn key(label: &str) -> Span<'_> {
    Span::styled(label, Style::new().bold().fg(Color::Yellow))
}

/// Renders the footer: either the latest status message or the keys
/// available in the current state.
pub fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(message) = &app.status_message {
        let footer = Paragraph::new(Line::from(message.as_str()).fg(Color::Red)).alignment(Alignment::Center);
        frame.render_widget(footer, area);
        return;
    }

    let spans = match app.state {
        AppState::Disclaimer => Line::from(vec![key("Enter"), Span::raw(" to accept, "), key("Q"), Span::raw(" to quit.")]),
        AppState::Idle => Line::from(vec![
            Span::raw("Press "),
            key("Enter"),
            Span::raw(" to register the domain, "),
            key("Esc"),
            Span::raw(" to quit."),
        ]),
        AppState::Verifying => Line::from(vec![
            key("[1]"),
            Span::raw(" DNS TXT "),
            key("[2]"),
            Span::raw(" File "),
            key("[3]"),
            Span::raw(" Meta tag  "),
            key("[S]"),
            Span::raw("can  "),
            key("[N]"),
            Span::raw("ew domain  "),
            key("[Q]"),
            Span::raw("uit"),
        ]),
        AppState::Scanning => Line::from(vec![
            key("[C]"),
            Span::raw("ancel  "),
            key("[L]"),
            Span::raw("ogs  "),
            key("[Q]"),
            Span::raw("uit"),
        ]),
        AppState::Finished => Line::from(vec![
            key("[R]"),
            Span::raw("escan  "),
            key("[N]"),
            Span::raw("ew domain  "),
            key("[L]"),
            Span::raw("ogs  "),
            key("[Q]"),
            Span::raw("uit"),
        ]),
    };

    let footer = Paragraph::new(spans).alignment(Alignment::Center);
    frame.render_widget(footer, area);
}
