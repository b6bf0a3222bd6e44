//! Raw samples as read from the OS, before any delta arithmetic.

pub type Pid = u32;

/// Cumulative CPU time counters from the aggregate `cpu` line, in ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuSample {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuSample {
    /// Sum of all ten counters. Wraps instead of panicking on absurd inputs.
    pub fn total(&self) -> u64 {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
            self.guest,
            self.guest_nice,
        ]
        .iter()
        .fold(0u64, |acc, v| acc.wrapping_add(*v))
    }
}

/// Point-in-time memory figures in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub buffer_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_free_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRawSample {
    pub pid: Pid,
    pub name: String,
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    pub resident_bytes: u64,
    pub priority: i64,
    pub state: char,
}

impl ProcessRawSample {
    pub fn total_ticks(&self) -> u64 {
        self.utime_ticks.saturating_add(self.stime_ticks)
    }
}
