use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::app::SortMode;

pub fn render(frame: &mut Frame, area: Rect, sort_mode: SortMode, alert: Option<&str>) {
    let bg_style = Style::default().bg(Color::Black);

    // A live alert takes priority over the key hints
    if let Some(msg) = alert {
        let line = Line::from(Span::styled(
            format!(" \u{26a0} {msg}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(Paragraph::new(line).style(bg_style), area);
        return;
    }

    let sort_desc = format!("Sort: {}", sort_mode.label());
    let mut spans = Vec::new();
    spans.extend(pill_spans("q", "Quit"));
    spans.extend(pill_spans("s", &sort_desc));
    spans.extend(pill_spans("r", "Refresh"));
    spans.extend(pill_spans("\u{2191}\u{2193}", "Scroll"));
    frame.render_widget(Paragraph::new(Line::from(spans)).style(bg_style), area);
}

fn pill_spans(key: &str, desc: &str) -> Vec<Span<'static>> {
    vec![
        Span::raw(" "),
        Span::styled(
            format!(" {key} "),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {desc}"), Style::default().fg(Color::Gray)),
    ]
}
