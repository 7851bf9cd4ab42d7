// src/ui/widgets/input.rs
use ratatui::{prelude::*, widgets::{Block, Borders, Paragraph}};
use crate::app::{App, AppState};

/// Renders the domain prompt. Once a domain is registered it shows the
/// normalized name and its verification state instead of the raw input.
pub fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let input_block = Block::default().borders(Borders::ALL).title("Target Domain");

    let line = match (&app.state, &app.domain) {
        (AppState::Idle | AppState::Disclaimer, _) | (_, None) => Line::from(app.input.as_str()).yellow(),
        (_, Some(domain)) => {
            let badge = if domain.is_verified {
                Span::styled(" [verified]", Style::default().fg(Color::Green))
            } else {
                Span::styled(" [unverified]", Style::default().fg(Color::Red))
            };
            Line::from(vec![Span::styled(domain.name.clone(), Style::default().fg(Color::Yellow)), badge])
        }
    };

    frame.render_widget(Paragraph::new(line).block(input_block), area);

    // Show the cursor only when in the Idle state.
    if let AppState::Idle = app.state {
        frame.set_cursor_position((area.x + app.input.chars().count() as u16 + 1, area.y + 1));
    }
}
