// src/ui/widgets/analysis_view.rs

use crate::app::{App, AppState};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    text::Line,
};
use vanguard_rs_sentinel::core::models::Severity;

pub fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Critical => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Severity::High => Style::default().fg(Color::Red),
        Severity::Medium => Style::default().fg(Color::Yellow),
        Severity::Low => Style::default().fg(Color::Cyan),
        Severity::Info => Style::default().fg(Color::DarkGray),
    }
}

pub fn render_analysis_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let main_block = Block::default()
        .borders(Borders::ALL)
        .title("Analysis Report (Navigate with ↑ ↓)");

    if !matches!(app.state, AppState::Finished) {
        let content = Paragraph::new("Scan results will appear here...").alignment(Alignment::Center);
        frame.render_widget(content.block(main_block), area);
        return;
    }

    let inner_area = main_block.inner(area);
    frame.render_widget(main_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Min(0)])
        .split(inner_area);

    let items: Vec<ListItem> = app
        .findings()
        .into_iter()
        .map(|f| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<9}", f.severity.to_string().to_uppercase()), severity_style(f.severity)),
                Span::styled(format!("[{}] ", f.category), Style::default().fg(Color::DarkGray)),
                Span::raw(f.title.clone()),
            ]))
        })
        .collect();

    let findings_list = List::new(items)
        .block(Block::default())
        .highlight_style(Style::new().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    frame.render_stateful_widget(findings_list, chunks[0], &mut app.analysis_list_state);

    let detail_block = Block::default().borders(Borders::TOP).title("Details");
    match app.selected_finding() {
        Some(finding) => {
            let mut text = vec![
                Line::from(""),
                Line::from("WHAT IT IS:".yellow().bold()),
                Line::from(finding.description.as_str()),
                Line::from(""),
                Line::from("HOW TO FIX:".yellow().bold()),
                Line::from(finding.recommendation.as_str()),
            ];
            if let Some(url) = &finding.affected_url {
                text.push(Line::from(""));
                text.push(Line::from(vec!["AFFECTED: ".yellow().bold(), Span::raw(url.as_str())]));
            }
            let p = Paragraph::new(text).wrap(Wrap { trim: true }).block(detail_block);
            frame.render_widget(p, chunks[1]);
        }
        None => render_placeholder_details(frame, app, detail_block, chunks[1]),
    }
}

fn render_placeholder_details(frame: &mut Frame, app: &App, block: Block, area: Rect) {
    let issues = app
        .summary
        .as_ref()
        .map_or(0, |s| s.score.total_findings - s.score.counts_by_severity.info);

    let placeholder_text = if issues == 0 {
        Text::from(vec![
            Line::from(""),
            Line::from("✓ NO ISSUES FOUND".bold().fg(Color::Green)),
            Line::from(""),
            Line::from("The checks that ran did not report anything above informational level."),
        ])
    } else {
        Text::from("Select an item above to see details.")
    };

    let p = Paragraph::new(placeholder_text).alignment(Alignment::Center).block(block);
    frame.render_widget(p, area);
}
