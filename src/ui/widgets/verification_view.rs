// src/ui/widgets/verification_view.rs

use crate::app::{App, SPINNER_CHARS};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
};

/// Renders the ownership proof screen: the token, how to publish it with each
/// method and the outcome of the last attempt.
pub fn render_verification_view(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Domain Verification");

    let Some(domain) = &app.domain else {
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    let mut lines = vec![
        Line::from(vec![Span::raw("Token: "), Span::styled(domain.verification_token.clone(), Style::default().fg(Color::Cyan).bold())]),
        Line::from(""),
    ];

    if domain.is_verified {
        lines.push(Line::from("✓ OWNERSHIP VERIFIED".bold().fg(Color::Green)));
        lines.push(Line::from(""));
        lines.push(Line::from(vec![Span::raw("Press "), "[S]".yellow().bold(), Span::raw(" to start a scan.")]));
    } else {
        lines.push(Line::from("Publish the token with one of these methods, then press its number:".bold()));
        for (i, (method, instruction)) in app.instructions.iter().enumerate() {
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled(format!("[{}] ", i + 1), Style::new().bold().fg(Color::Yellow)),
                Span::styled(method.to_string(), Style::default().fg(Color::Cyan)),
            ]));
            lines.push(Line::from(instruction.as_str()));
        }
    }

    if app.busy {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(format!("{} ", SPINNER_CHARS[app.spinner_frame]), Style::default().fg(Color::Cyan)),
            Span::raw("Checking..."),
        ]));
    } else if let Some(report) = &app.last_verification {
        lines.push(Line::from(""));
        lines.push(Line::from("LAST ATTEMPT:".yellow().bold()));
        let outcome = if report.verified {
            Span::styled(format!("{}: verified", report.method), Style::default().fg(Color::Green))
        } else {
            Span::styled(format!("{}: not verified", report.method), Style::default().fg(Color::Red))
        };
        lines.push(Line::from(outcome));
        if let Some(diagnostic) = &report.diagnostic {
            lines.push(Line::from(diagnostic.as_str()).fg(Color::DarkGray));
        }
    }

    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(block);
    frame.render_widget(paragraph, area);
}
