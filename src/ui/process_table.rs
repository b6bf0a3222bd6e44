use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Row, Table};

use crate::app::{App, RowHeat};
use crate::format::{format_bytes, format_cpu_time, truncate_unicode};

const NAME_WIDTH: usize = 24;

pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(["PID", "NAME", "S", "PRI", "CPU%", "MEM", "TIME+"]).style(
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    let rows = app.visible_rows().iter().map(|p| {
        let style = match app.heat(p) {
            RowHeat::Alert => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            RowHeat::Active => Style::default().fg(Color::Green),
            RowHeat::Normal => Style::default(),
        };
        Row::new([
            Cell::from(p.pid.to_string()),
            Cell::from(truncate_unicode(&p.name, NAME_WIDTH)),
            Cell::from(p.state.to_string()),
            Cell::from(p.priority.to_string()),
            Cell::from(format!("{:.1}", p.cpu_usage_pct)),
            Cell::from(format_bytes(p.memory_bytes)),
            Cell::from(format_cpu_time(p.cpu_time)),
        ])
        .style(style)
    });

    let widths = [
        Constraint::Length(7),
        Constraint::Min(NAME_WIDTH as u16),
        Constraint::Length(2),
        Constraint::Length(4),
        Constraint::Length(6),
        Constraint::Length(10),
        Constraint::Length(10),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" Processes, sorted by {} ", app.sort_mode.label()));

    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}
