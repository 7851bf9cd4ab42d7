// src/ui/widgets/disclaimer_popup.rs

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    text::Line,
};

/// Renders the consent popup on top of the existing UI.
///
/// Acknowledging it is the operator's consent for every scan started in this
/// session. Scans are also limited to domains whose ownership has been proven.
pub fn render_disclaimer_popup(frame: &mut Frame, area: Rect) {
    let disclaimer_text = Text::from(vec![
        Line::from("AUTHORIZATION & CONSENT".bold().yellow()),
        Line::from(""),
        Line::from("Vanguard RS Sentinel runs non-destructive security checks against websites you own."),
        Line::from(""),
        Line::from("Before any scan you must prove control of the domain with a DNS TXT record, a file under /.well-known/ or a meta tag on the home page."),
        Line::from(""),
        Line::from("By continuing you confirm that:"),
        Line::from("1. You own the domains you register here, or hold written permission to test them."),
        Line::from("2. You authorize the checks to send ordinary HTTPS and DNS requests to those domains."),
        Line::from("3. Results are indicative only; the absence of findings is not a guarantee of security."),
        Line::from(""),
        Line::from("Press ".bold() + "Enter".bold().yellow() + " to give consent and continue".bold()),
    ]);

    let block = Block::default()
        .title("Consent")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let popup_area = centered_rect(70, 70, area);

    let popup = Paragraph::new(disclaimer_text)
        .block(block)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center);

    // Clear first so the background does not bleed through.
    frame.render_widget(Clear, popup_area);
    frame.render_widget(popup, popup_area);
}

/// A rectangle of the given percentage size centered in `r`.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(r);

    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    center
}
