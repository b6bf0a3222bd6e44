use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use crate::format::format_bytes;
use crate::system::Snapshot;

pub fn render(frame: &mut Frame, area: Rect, snapshot: &Snapshot, stale: &[&str]) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " procwatch ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
        .title(Span::styled(
            format!(" {} processes ", snapshot.process_count),
            Style::default().fg(Color::Gray),
        ));

    let lines = vec![cpu_line(snapshot, stale), memory_line(snapshot, stale)];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn cpu_line(snapshot: &Snapshot, stale: &[&str]) -> Line<'static> {
    let cpu = &snapshot.cpu;
    let mut spans = vec![label("CPU")];
    spans.extend(metric("user", format!("{:.1}%", cpu.user_pct)));
    spans.extend(metric("system", format!("{:.1}%", cpu.system_pct)));
    spans.extend(metric("idle", format!("{:.1}%", cpu.idle_pct)));
    spans.extend(metric("iowait", format!("{:.1}%", cpu.iowait_pct)));
    if stale.contains(&"cpu") {
        spans.push(stale_marker());
    }
    Line::from(spans)
}

pub fn memory_line(snapshot: &Snapshot, stale: &[&str]) -> Line<'static> {
    let mem = &snapshot.memory;
    let mut spans = vec![label("Mem")];
    spans.extend(metric("total", format_bytes(mem.total)));
    spans.extend(metric("used", format_bytes(mem.used)));
    spans.extend(metric("free", format_bytes(mem.free)));
    spans.extend(metric("cached", format_bytes(mem.cached)));
    spans.extend(metric("swap", format_bytes(mem.swap_used)));
    if stale.contains(&"memory") {
        spans.push(stale_marker());
    }
    Line::from(spans)
}

fn label(text: &'static str) -> Span<'static> {
    Span::styled(
        format!("{text:<4}"),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
}

fn metric(name: &'static str, value: String) -> [Span<'static>; 2] {
    [
        Span::styled(format!(" {name} "), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(Color::White)),
    ]
}

fn stale_marker() -> Span<'static> {
    Span::styled(
        "  (stale)",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::ITALIC),
    )
}
