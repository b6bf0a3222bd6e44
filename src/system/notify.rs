//! Alert delivery. The core only produces [`AlertEvent`]s; sinks decide what
//! to do with them.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::mpsc;

use super::alerts::AlertEvent;

pub trait AlertSink: Send {
    fn name(&self) -> &'static str;
    fn deliver(&mut self, event: &AlertEvent) -> io::Result<()>;
}

/// Emits each alert as a structured `warn` event.
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(&mut self, event: &AlertEvent) -> io::Result<()> {
        tracing::warn!(
            pid = event.pid,
            name = %event.name,
            cpu_usage_pct = event.cpu_usage_pct,
            threshold = event.threshold,
            "{}",
            AlertEvent::TITLE
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct AlertRecord<'a> {
    #[serde(flatten)]
    event: &'a AlertEvent,
    unix_ms: u64,
}

/// Appends one JSON object per alert to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    file: File,
}

impl JsonLinesSink {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }
}

impl AlertSink for JsonLinesSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn deliver(&mut self, event: &AlertEvent) -> io::Result<()> {
        let unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut line = serde_json::to_string(&AlertRecord { event, unix_ms })?;
        line.push('\n');
        self.file.write_all(line.as_bytes())
    }
}

/// Writes the full alert text to a terminal or any other writer.
#[derive(Debug)]
pub struct ConsoleSink<W> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> AlertSink for ConsoleSink<W> {
    fn name(&self) -> &'static str {
        "console"
    }

    fn deliver(&mut self, event: &AlertEvent) -> io::Result<()> {
        writeln!(self.out, "{}: {}", AlertEvent::TITLE, event.message())?;
        self.out.flush()
    }
}

/// Bounded list of the most recent alerts, shared with the display.
#[derive(Debug, Clone)]
pub struct RecentAlerts {
    inner: Arc<Mutex<VecDeque<(AlertEvent, Instant)>>>,
    capacity: usize,
}

impl RecentAlerts {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, event: AlertEvent) {
        let mut alerts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if alerts.len() == self.capacity {
            alerts.pop_front();
        }
        alerts.push_back((event, Instant::now()));
    }

    pub fn latest(&self) -> Option<(AlertEvent, Instant)> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for RecentAlerts {
    fn name(&self) -> &'static str {
        "recent"
    }

    fn deliver(&mut self, event: &AlertEvent) -> io::Result<()> {
        self.push(event.clone());
        Ok(())
    }
}

/// Drains the alert channel into every sink until all senders are dropped.
pub async fn dispatch_alerts(
    mut rx: mpsc::UnboundedReceiver<AlertEvent>,
    mut sinks: Vec<Box<dyn AlertSink>>,
) {
    while let Some(event) = rx.recv().await {
        for sink in sinks.iter_mut() {
            if let Err(err) = sink.deliver(&event) {
                tracing::warn!(sink = sink.name(), error = %err, "alert delivery failed");
            }
        }
    }
    tracing::debug!("alert channel closed");
}
