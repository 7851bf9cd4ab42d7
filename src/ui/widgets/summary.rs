// src/ui/widgets/summary.rs

use crate::app::App;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Gauge, Paragraph},
    text::Line,
};
use vanguard_rs_sentinel::core::models::Severity;
use strum::IntoEnumIterator;

use super::analysis_view::severity_style;

fn score_color(score: u8) -> Color {
    match score {
        90..=100 => Color::Green,
        75..=89 => Color::Cyan,
        50..=74 => Color::Yellow,
        _ => Color::Red,
    }
}

/// Renders the score overview. While a scan is running it shows the partial
/// score of the categories assessed so far.
pub fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let summary_container = Block::default().borders(Borders::ALL).title("Summary");
    frame.render_widget(summary_container, area);

    let summary_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Score & Rating section
            Constraint::Length(1), // Gauge chart
            Constraint::Length(1), // Spacer
            Constraint::Length(7), // Categories
            Constraint::Length(1), // Spacer
            Constraint::Min(0),    // Severity counts
        ])
        .split(area);

    let Some(summary) = &app.summary else {
        return;
    };
    let score = &summary.score;

    // --- Score & Rating Section ---
    let rating_style = Style::default().fg(score_color(score.overall_score));
    let score_line = Line::from(format!("{}/100 ({})", score.overall_score, score.rating)).style(rating_style);
    let score_text = Text::from(vec![Line::from(summary.domain_name.as_str().bold()), score_line]);
    frame.render_widget(Paragraph::new(score_text).alignment(Alignment::Center), summary_chunks[0]);

    let score_gauge = Gauge::default()
        .percent(u16::from(score.overall_score))
        .label("")
        .style(rating_style);
    frame.render_widget(score_gauge, summary_chunks[1]);

    // --- Categories Section ---
    let categories_block = Block::default().title("CATEGORIES".bold());
    let category_lines: Vec<Line> = score
        .category_scores
        .iter()
        .map(|c| match c.score {
            Some(value) => Line::from(vec![
                Span::styled(format!("{value:>3} "), Style::default().fg(score_color(value))),
                Span::raw(c.category.to_string()),
            ]),
            None => Line::from(vec![
                Span::styled("  - ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{} ({})", c.category, if c.incomplete { "incomplete" } else { "not assessed" }),
                    Style::default().fg(if c.incomplete { Color::Yellow } else { Color::DarkGray }),
                ),
            ]),
        })
        .collect();
    frame.render_widget(Paragraph::new(category_lines).block(categories_block), summary_chunks[3]);

    // --- Issues Section ---
    let issues_block = Block::default().title(Span::from(format!("ISSUES FOUND ({})", score.total_findings)).bold());
    let issue_lines: Vec<Line> = Severity::iter()
        .map(|severity| {
            Line::from(vec![
                Span::raw(format!("{:<9}", format!("{severity}:"))),
                Span::styled(score.counts_by_severity.get(severity).to_string(), severity_style(severity)),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(issue_lines).block(issues_block), summary_chunks[5]);
}
