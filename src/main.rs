use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use procwatch::app::App;
use procwatch::config::{Config, load_config, load_config_from_path};
use procwatch::event::{Event, EventHandler};
use procwatch::logging::{LogFormat, LogTarget, init_tracing};
use procwatch::system::notify::{
    AlertSink, ConsoleSink, JsonLinesSink, LogSink, RecentAlerts, dispatch_alerts,
};
use procwatch::system::scheduler::{self, SchedulerHandle};
use procwatch::system::{CounterSource, MetricsStore, ProcfsSource};
use procwatch::{report, ui};

const RECENT_ALERTS: usize = 32;
const HEADLESS_TOP: usize = 15;
const BLOCKING_READ_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(
    name = "procwatch",
    about = "Terminal resource monitor with per-process CPU alerts"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display refresh rate in milliseconds
    #[arg(long)]
    refresh_rate: Option<u64>,

    /// Per-process CPU alert threshold in percent
    #[arg(long)]
    threshold: Option<f64>,

    /// Stop after this many display cycles (0 runs until quit)
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Print a text summary each cycle instead of running the TUI
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    init_logging(&config, cli.headless)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(monitor(cli, config));
    // A procfs read stuck in the kernel must not keep the process alive.
    runtime.shutdown_timeout(BLOCKING_READ_GRACE);
    result
}

async fn monitor(cli: Cli, config: Config) -> Result<()> {

    let source: Arc<dyn CounterSource> =
        Arc::new(ProcfsSource::new(config.sampling.proc_root.clone()));
    let store = Arc::new(MetricsStore::new());
    let recent = RecentAlerts::new(RECENT_ALERTS);

    let (alert_tx, alert_rx) = mpsc::unbounded_channel();
    let handle = scheduler::spawn(
        source,
        Arc::clone(&store),
        &config.scheduler_config(),
        alert_tx,
    );
    let dispatcher = tokio::spawn(dispatch_alerts(
        alert_rx,
        alert_sinks(&config, &recent, cli.headless),
    ));

    tracing::info!(
        proc_root = %config.sampling.proc_root.display(),
        threshold = config.alerts.cpu_threshold_pct,
        headless = cli.headless,
        "procwatch started"
    );

    let app = App::new(store, recent, &config);
    let result = if cli.headless {
        run_headless(app, &config, &handle).await
    } else {
        run_tui(app, &config).await
    };

    stop(handle, dispatcher).await;
    result
}

async fn run_tui(mut app: App, config: &Config) -> Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    let result = run(&mut terminal, &mut app, config).await;
    ratatui::restore();
    result
}

async fn run(
    terminal: &mut ratatui::DefaultTerminal,
    app: &mut App,
    config: &Config,
) -> Result<()> {
    let tick_rate = Duration::from_millis(config.general.refresh_rate_ms.max(1));
    let mut events = EventHandler::new(tick_rate);

    terminal.draw(|frame| ui::draw(frame, app))?;

    while app.running {
        let Some(event) = events.next().await else {
            break;
        };
        match event {
            Event::Key(key) => {
                let action = app.map_key(key);
                app.dispatch(action);
            }
            Event::Tick => app.on_tick(),
            Event::Resize => {}
        }
        terminal.draw(|frame| ui::draw(frame, app))?;
    }

    Ok(())
}

async fn run_headless(mut app: App, config: &Config, handle: &SchedulerHandle) -> Result<()> {
    let mut shutdown = handle.shutdown_signal();
    let mut ticker =
        tokio::time::interval(Duration::from_millis(config.general.refresh_rate_ms.max(1)));
    // the first tick completes immediately
    ticker.tick().await;

    while app.running {
        tokio::select! {
            _ = ticker.tick() => {}
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("interrupted");
                break;
            }
            _ = shutdown.wait() => break,
        }
        app.on_tick();
        let stale = app.stale_families(Instant::now());
        println!(
            "{}",
            report::render_text(&app.snapshot, app.ticks(), HEADLESS_TOP, &stale)
        );
    }

    Ok(())
}

async fn stop(handle: SchedulerHandle, dispatcher: JoinHandle<()>) {
    handle.shutdown().await;
    // The process task held the last alert sender, so the dispatcher drains
    // what is queued and exits.
    if let Err(err) = dispatcher.await {
        tracing::warn!(error = %err, "alert dispatcher did not exit cleanly");
    }
    tracing::info!("procwatch stopped");
}

fn alert_sinks(config: &Config, recent: &RecentAlerts, headless: bool) -> Vec<Box<dyn AlertSink>> {
    let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(LogSink), Box::new(recent.clone())];
    if headless {
        sinks.push(Box::new(ConsoleSink::stdout()));
    }
    if let Some(path) = &config.alerts.log_path {
        match JsonLinesSink::open(path) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "alert log unavailable")
            }
        }
    }
    sinks
}

fn init_logging(config: &Config, headless: bool) -> Result<()> {
    let target = match &config.logging.file {
        Some(path) => LogTarget::File(path.clone()),
        // stderr would tear the TUI, so interactive runs without a file stay quiet
        None if headless => LogTarget::Stderr,
        None => return Ok(()),
    };
    init_tracing(
        &config.logging.level,
        LogFormat::from_str_config(&config.logging.format),
        &target,
    )
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(threshold) = cli.threshold {
        config.alerts.cpu_threshold_pct = threshold;
    }
    if let Some(max_cycles) = cli.max_cycles {
        config.general.max_cycles = max_cycles;
    }
    if let Some(ref path) = cli.log_file {
        config.logging.file = Some(path.clone());
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    config
}
