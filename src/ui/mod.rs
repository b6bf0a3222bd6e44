pub mod header;
pub mod process_table;
pub mod statusbar;

use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};

use crate::app::App;

pub fn draw(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    // borders (2) plus the column header row
    app.table_height = chunks[1].height.saturating_sub(3) as usize;

    let stale = app.stale_families(Instant::now());
    header::render(frame, chunks[0], &app.snapshot, &stale);
    process_table::render(frame, chunks[1], app);
    statusbar::render(
        frame,
        chunks[2],
        app.sort_mode,
        app.latest_alert_message().as_deref(),
    );
}
