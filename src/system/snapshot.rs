use std::time::{Duration, Instant};

use super::counters::Pid;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuMetrics {
    pub user_pct: f64,
    pub system_pct: f64,
    pub idle_pct: f64,
    pub iowait_pct: f64,
}

/// Memory figures in bytes. `cached` is the kernel buffer figure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryMetrics {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub cached: u64,
    pub swap_used: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessMetrics {
    pub pid: Pid,
    pub name: String,
    pub cpu_usage_pct: f64,
    pub memory_bytes: u64,
    pub priority: i64,
    pub state: char,
    /// Accumulated user + system time since the process started.
    pub cpu_time: Duration,
}

/// Freshness bookkeeping for one family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyStatus {
    pub cycles: u64,
    pub last_updated: Option<Instant>,
    pub last_error: Option<String>,
}

impl FamilyStatus {
    pub fn has_data(&self) -> bool {
        self.last_updated.is_some()
    }

    /// Stale when the last cycle failed or nothing landed within `max_age`.
    pub fn is_stale(&self, now: Instant, max_age: Duration) -> bool {
        if self.last_error.is_some() {
            return true;
        }
        match self.last_updated {
            Some(at) => now.saturating_duration_since(at) > max_age,
            None => true,
        }
    }
}

/// Coherent copy of the latest values of every family.
///
/// Families may come from different cycles, but each family's fields always
/// come from a single cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub processes: Vec<ProcessMetrics>,
    pub process_count: usize,
    pub cpu_status: FamilyStatus,
    pub memory_status: FamilyStatus,
    pub process_status: FamilyStatus,
}
