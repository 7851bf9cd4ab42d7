// src/ui/widgets/scan_progress.rs

use crate::app::{App, SPINNER_CHARS};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph},
};
use vanguard_rs_sentinel::core::catalog;

pub fn render_scan_progress(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Scan Progress");
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(inner_area);

    let (progress, cursor) = app
        .scan
        .as_ref()
        .map_or((0, 0), |scan| (scan.progress, scan.current_step_index));

    let gauge = Gauge::default()
        .percent(u16::from(progress))
        .label(format!("{progress}%"))
        .gauge_style(Style::default().fg(Color::Cyan));
    frame.render_widget(gauge, chunks[0]);

    // Steps before the cursor are done, the one at the cursor is running.
    let lines: Vec<Line> = catalog::steps()
        .iter()
        .map(|step| {
            let (icon, style) = if step.index < cursor {
                ("✓".to_string(), Style::default().fg(Color::Green))
            } else if step.index == cursor {
                (SPINNER_CHARS[app.spinner_frame].to_string(), Style::default().fg(Color::Cyan))
            } else {
                ("·".to_string(), Style::default().fg(Color::DarkGray))
            };
            Line::from(vec![Span::styled(format!("{icon} "), style), Span::raw(step.name)])
        })
        .collect();

    let mut text = lines;
    if let Some(step) = &app.last_step {
        text.push(Line::from(""));
        text.push(Line::from(format!("Last step: {} new finding(s)", step.new_findings)).fg(Color::DarkGray));
    }

    frame.render_widget(Paragraph::new(text), chunks[2]);
}
