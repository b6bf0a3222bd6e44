use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::action::{Action, Scroll};
use crate::config::Config;
use crate::system::notify::RecentAlerts;
use crate::system::{MetricsStore, ProcessMetrics, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Cpu,
    Memory,
    Pid,
}

impl SortMode {
    pub fn next(self) -> Self {
        match self {
            SortMode::Cpu => SortMode::Memory,
            SortMode::Memory => SortMode::Pid,
            SortMode::Pid => SortMode::Cpu,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::Cpu => "CPU",
            SortMode::Memory => "Memory",
            SortMode::Pid => "PID",
        }
    }

    fn sort(self, rows: &mut [ProcessMetrics]) {
        match self {
            SortMode::Cpu => rows.sort_by(|a, b| {
                b.cpu_usage_pct
                    .total_cmp(&a.cpu_usage_pct)
                    .then(a.pid.cmp(&b.pid))
            }),
            SortMode::Memory => {
                rows.sort_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes).then(a.pid.cmp(&b.pid)))
            }
            SortMode::Pid => rows.sort_by_key(|p| p.pid),
        }
    }
}

/// How a process row should be highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowHeat {
    Normal,
    Active,
    Alert,
}

pub struct App {
    pub running: bool,
    pub snapshot: Snapshot,
    pub rows: Vec<ProcessMetrics>,
    pub sort_mode: SortMode,
    pub scroll: usize,
    pub table_height: usize,
    pub alert_threshold: f64,
    pub active_threshold: f64,
    pub stale_after: Duration,
    pub recent_alerts: RecentAlerts,
    store: Arc<MetricsStore>,
    ticks: u64,
    max_cycles: u64,
}

impl App {
    pub fn new(store: Arc<MetricsStore>, recent_alerts: RecentAlerts, config: &Config) -> Self {
        let mut app = App {
            running: true,
            snapshot: Snapshot::default(),
            rows: Vec::new(),
            sort_mode: SortMode::default(),
            scroll: 0,
            table_height: 0,
            alert_threshold: config.alerts.cpu_threshold_pct,
            active_threshold: config.general.active_threshold_pct,
            stale_after: config.stale_after(),
            recent_alerts,
            store,
            ticks: 0,
            max_cycles: config.general.max_cycles,
        };
        app.refresh_data();
        app
    }

    /// Pulls a fresh snapshot from the store and re-sorts the table.
    pub fn refresh_data(&mut self) {
        self.snapshot = self.store.snapshot();
        self.rows = self.snapshot.processes.clone();
        self.sort_mode.sort(&mut self.rows);
        self.clamp_scroll();
    }

    /// One display cycle. Stops the app once `max_cycles` is reached.
    pub fn on_tick(&mut self) {
        self.refresh_data();
        self.ticks += 1;
        if self.max_cycles > 0 && self.ticks >= self.max_cycles {
            tracing::info!(cycles = self.ticks, "display cycle limit reached");
            self.running = false;
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn map_key(&self, key: KeyEvent) -> Action {
        // Ctrl+C always quits (hardwired safety)
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Action::Quit;
        }

        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('s') => Action::CycleSortMode,
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Up => Action::Scroll(Scroll::Up),
            KeyCode::Down => Action::Scroll(Scroll::Down),
            KeyCode::PageUp => Action::Scroll(Scroll::PageUp),
            KeyCode::PageDown => Action::Scroll(Scroll::PageDown),
            KeyCode::Home => Action::Scroll(Scroll::Top),
            _ => Action::None,
        }
    }

    pub fn dispatch(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Scroll(scroll) => self.scroll_by(scroll),
            Action::CycleSortMode => {
                self.sort_mode = self.sort_mode.next();
                self.sort_mode.sort(&mut self.rows);
                self.scroll = 0;
            }
            Action::Refresh => self.refresh_data(),
            Action::None => {}
        }
    }

    fn scroll_by(&mut self, scroll: Scroll) {
        let page = self.table_height.max(1);
        self.scroll = match scroll {
            Scroll::Up => self.scroll.saturating_sub(1),
            Scroll::Down => self.scroll + 1,
            Scroll::PageUp => self.scroll.saturating_sub(page),
            Scroll::PageDown => self.scroll + page,
            Scroll::Top => 0,
        };
        self.clamp_scroll();
    }

    fn clamp_scroll(&mut self) {
        let max_scroll = self.rows.len().saturating_sub(self.table_height.max(1));
        self.scroll = self.scroll.min(max_scroll);
    }

    pub fn visible_rows(&self) -> &[ProcessMetrics] {
        let start = self.scroll.min(self.rows.len());
        let end = if self.table_height == 0 {
            self.rows.len()
        } else {
            (start + self.table_height).min(self.rows.len())
        };
        &self.rows[start..end]
    }

    pub fn heat(&self, process: &ProcessMetrics) -> RowHeat {
        if process.cpu_usage_pct > self.alert_threshold {
            RowHeat::Alert
        } else if process.cpu_usage_pct > self.active_threshold {
            RowHeat::Active
        } else {
            RowHeat::Normal
        }
    }

    pub fn latest_alert_message(&self) -> Option<String> {
        let (event, at) = self.recent_alerts.latest()?;
        // Fade out once the alert is older than a few display cycles
        if at.elapsed() > self.stale_after {
            return None;
        }
        Some(format!(
            "PID {} ({}) at {:.1}% CPU > {:.1}%",
            event.pid, event.name, event.cpu_usage_pct, event.threshold
        ))
    }

    pub fn stale_families(&self, now: Instant) -> Vec<&'static str> {
        let snap = &self.snapshot;
        [
            ("cpu", &snap.cpu_status),
            ("memory", &snap.memory_status),
            ("processes", &snap.process_status),
        ]
        .into_iter()
        .filter(|(_, status)| status.is_stale(now, self.stale_after))
        .map(|(name, _)| name)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::alerts::AlertEvent;
    use crate::system::{CpuMetrics, Family, SampleError};

    fn make_process(pid: u32, memory: u64, cpu: f64) -> ProcessMetrics {
        ProcessMetrics {
            pid,
            name: format!("proc_{pid}"),
            cpu_usage_pct: cpu,
            memory_bytes: memory,
            priority: 20,
            state: 'S',
            cpu_time: Duration::ZERO,
        }
    }

    fn make_app(procs: Vec<ProcessMetrics>) -> App {
        let store = Arc::new(MetricsStore::new());
        store.set_processes(procs);
        App::new(store, RecentAlerts::new(4), &Config::default())
    }

    #[test]
    fn sort_mode_cycles_through_all_variants() {
        let mode = SortMode::Cpu;
        assert_eq!(mode.next(), SortMode::Memory);
        assert_eq!(mode.next().next(), SortMode::Pid);
        assert_eq!(mode.next().next().next(), SortMode::Cpu);
    }

    #[test]
    fn default_sort_is_cpu_descending() {
        let app = make_app(vec![
            make_process(1, 500, 5.0),
            make_process(2, 100, 90.0),
            make_process(3, 300, 50.0),
        ]);
        let pids: Vec<u32> = app.rows.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![2, 3, 1]);
    }

    #[test]
    fn cpu_ties_fall_back_to_pid() {
        let app = make_app(vec![
            make_process(9, 0, 40.0),
            make_process(4, 0, 40.0),
            make_process(6, 0, 0.0),
        ]);
        let pids: Vec<u32> = app.rows.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![4, 9, 6]);
    }

    #[test]
    fn dispatch_cycle_sort_reorders_rows() {
        let mut app = make_app(vec![
            make_process(3, 500, 5.0),
            make_process(1, 100, 90.0),
            make_process(2, 300, 50.0),
        ]);
        app.dispatch(Action::CycleSortMode);
        assert_eq!(app.sort_mode, SortMode::Memory);
        let pids: Vec<u32> = app.rows.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![3, 2, 1]);

        app.dispatch(Action::CycleSortMode);
        let pids: Vec<u32> = app.rows.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1, 2, 3]);
    }

    #[test]
    fn keys_map_to_actions() {
        let app = make_app(vec![]);
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(app.map_key(key(KeyCode::Char('q'))), Action::Quit);
        assert_eq!(app.map_key(key(KeyCode::Char('s'))), Action::CycleSortMode);
        assert_eq!(app.map_key(key(KeyCode::Char('r'))), Action::Refresh);
        assert_eq!(app.map_key(key(KeyCode::Down)), Action::Scroll(Scroll::Down));
        assert_eq!(app.map_key(key(KeyCode::Char('x'))), Action::None);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.map_key(ctrl_c), Action::Quit);
    }

    #[test]
    fn scrolling_is_clamped_to_rows() {
        let procs = (1..=10).map(|pid| make_process(pid, 0, 0.0)).collect();
        let mut app = make_app(procs);
        app.table_height = 4;
        app.dispatch(Action::Scroll(Scroll::PageDown));
        assert_eq!(app.scroll, 4);
        app.dispatch(Action::Scroll(Scroll::PageDown));
        assert_eq!(app.scroll, 6);
        assert_eq!(app.visible_rows().len(), 4);
        app.dispatch(Action::Scroll(Scroll::Top));
        assert_eq!(app.scroll, 0);
        app.dispatch(Action::Scroll(Scroll::Up));
        assert_eq!(app.scroll, 0);
    }

    #[test]
    fn heat_follows_thresholds() {
        let app = make_app(vec![]);
        assert_eq!(app.heat(&make_process(1, 0, 85.0)), RowHeat::Alert);
        assert_eq!(app.heat(&make_process(1, 0, 60.0)), RowHeat::Active);
        assert_eq!(app.heat(&make_process(1, 0, 50.0)), RowHeat::Normal);
    }

    #[test]
    fn max_cycles_stops_the_app() {
        let store = Arc::new(MetricsStore::new());
        let mut config = Config::default();
        config.general.max_cycles = 2;
        let mut app = App::new(store, RecentAlerts::new(4), &config);
        app.on_tick();
        assert!(app.running);
        app.on_tick();
        assert!(!app.running);
        assert_eq!(app.ticks(), 2);
    }

    #[test]
    fn stale_families_are_reported() {
        let store = Arc::new(MetricsStore::new());
        store.set_cpu(CpuMetrics::default());
        store.set_processes(Vec::new());
        store.record_failure(
            Family::Processes,
            &SampleError::Timeout {
                family: Family::Processes,
                after: Duration::from_millis(500),
            },
        );
        let app = App::new(store, RecentAlerts::new(4), &Config::default());
        assert_eq!(app.stale_families(Instant::now()), vec!["memory", "processes"]);
    }

    #[test]
    fn latest_alert_is_summarised() {
        let recent = RecentAlerts::new(4);
        recent.push(AlertEvent {
            pid: 42,
            name: "spin".into(),
            cpu_usage_pct: 85.0,
            threshold: 70.0,
        });
        let app = App::new(Arc::new(MetricsStore::new()), recent, &Config::default());
        assert_eq!(
            app.latest_alert_message().as_deref(),
            Some("PID 42 (spin) at 85.0% CPU > 70.0%")
        );
    }
}
