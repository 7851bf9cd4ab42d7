// src/ui/widgets/log_view.rs

use crate::app::App;
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation},
};

fn level_style(level: &str) -> Style {
    match level {
        "ERROR" => Style::default().fg(Color::Red),
        "WARN" => Style::default().fg(Color::Yellow),
        "INFO" => Style::default().fg(Color::Green),
        _ => Style::default().fg(Color::DarkGray),
    }
}

/// Styles one log line written as `DATE TIME LEVEL MESSAGE`. Lines in any
/// other shape are shown unchanged.
fn styled_line(line: &str) -> Line<'_> {
    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(date), Some(time), Some(rest)) => {
            let rest = rest.trim_start();
            let (level, message) = rest.split_once(' ').unwrap_or((rest, ""));
            Line::from(vec![
                Span::styled(format!("{date} {time} "), Style::default().fg(Color::DarkGray)),
                Span::styled(level, level_style(level)),
                Span::raw(format!(" {message}")),
            ])
        }
        _ => Line::from(line),
    }
}

/// Renders the tail of the log file with a horizontal scrollbar for long lines.
pub fn render_log_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().title("Logs (scroll with ← →)").borders(Borders::ALL);
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let max_width = app.log_content.iter().map(|line| line.chars().count()).max().unwrap_or(0);
    app.log_horizontal_scroll_state = app.log_horizontal_scroll_state.content_length(max_width);

    // Newest lines stay visible at the bottom.
    let visible = inner_area.height.saturating_sub(1) as usize;
    let start = app.log_content.len().saturating_sub(visible);
    let log_lines: Vec<Line> = app.log_content[start..].iter().map(|l| styled_line(l)).collect();

    let log_paragraph = Paragraph::new(log_lines).scroll((0, app.log_horizontal_scroll as u16));
    frame.render_widget(log_paragraph, inner_area);

    let scrollbar = Scrollbar::new(ScrollbarOrientation::HorizontalBottom).thumb_symbol("■");
    let scrollbar_area = Rect {
        x: inner_area.x,
        y: inner_area.y + inner_area.height.saturating_sub(1),
        width: inner_area.width,
        height: 1,
    };
    frame.render_stateful_widget(scrollbar, scrollbar_area, &mut app.log_horizontal_scroll_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_timestamp_level_and_message() {
        let line = styled_line("2026-10-19 10:00:00  INFO Scan started.");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "INFO");
        assert_eq!(line.spans[2].content, " Scan started.");
    }
}
