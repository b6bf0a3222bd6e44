use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::system::scheduler::SchedulerConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub sampling: SamplingConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub max_cycles: u64,
    pub active_threshold_pct: f64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 1000,
            max_cycles: 0,
            active_threshold_pct: 50.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub refresh_interval_ms: u64,
    pub cpu_interval_ms: Option<u64>,
    pub memory_interval_ms: Option<u64>,
    pub process_interval_ms: Option<u64>,
    pub max_tracked_processes: usize,
    pub io_timeout_ms: u64,
    pub proc_root: PathBuf,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            refresh_interval_ms: 1000,
            cpu_interval_ms: None,
            memory_interval_ms: None,
            process_interval_ms: None,
            max_tracked_processes: 1024,
            io_timeout_ms: 500,
            proc_root: PathBuf::from("/proc"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub cpu_threshold_pct: f64,
    pub cooldown_cycles: u64,
    pub log_path: Option<PathBuf>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        AlertsConfig {
            cpu_threshold_pct: 70.0,
            cooldown_cycles: 0,
            log_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}

impl Config {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let sampling = &self.sampling;
        let interval = |family: Option<u64>| {
            Duration::from_millis(family.unwrap_or(sampling.refresh_interval_ms).max(1))
        };
        SchedulerConfig {
            cpu_interval: interval(sampling.cpu_interval_ms),
            memory_interval: interval(sampling.memory_interval_ms),
            process_interval: interval(sampling.process_interval_ms),
            io_timeout: Duration::from_millis(sampling.io_timeout_ms.max(1)),
            max_tracked_processes: sampling.max_tracked_processes,
            cpu_alert_threshold: self.alerts.cpu_threshold_pct,
            alert_cooldown_cycles: self.alerts.cooldown_cycles,
        }
    }

    /// Oldest acceptable age for a family before the display flags it stale.
    pub fn stale_after(&self) -> Duration {
        let scheduler = self.scheduler_config();
        let slowest = scheduler
            .cpu_interval
            .max(scheduler.memory_interval)
            .max(scheduler.process_interval);
        slowest * 3
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("procwatch").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}
