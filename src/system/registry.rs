use std::collections::HashMap;
use std::time::Duration;

use super::counters::{Pid, ProcessRawSample};
use super::error::SampleError;
use super::platform;
use super::sampler::compute_process_cpu;
use super::snapshot::ProcessMetrics;
use super::source::CounterSource;

pub const DEFAULT_MAX_TRACKED: usize = 1024;

/// Everything read from the source for one process-family cycle.
#[derive(Debug, Clone, Default)]
pub struct RawCycle {
    pub system_total_ticks: u64,
    pub samples: Vec<ProcessRawSample>,
}

/// Reads the system tick total and every enumerated process.
///
/// Processes that exit mid-cycle or have an unreadable stat line are skipped;
/// only a failure to read the system counters or to enumerate fails the cycle.
/// `max_tracked == 0` disables truncation.
pub fn read_cycle(source: &dyn CounterSource, max_tracked: usize) -> Result<RawCycle, SampleError> {
    let system_total_ticks = source.read_cpu_counters()?.total();

    let mut pids = source.enumerate_processes()?;
    if max_tracked > 0 && pids.len() > max_tracked {
        tracing::debug!(
            enumerated = pids.len(),
            max_tracked,
            "truncating process enumeration"
        );
        pids.truncate(max_tracked);
    }

    let mut samples = Vec::with_capacity(pids.len());
    let mut vanished = 0usize;
    for pid in pids {
        match source.read_process_raw(pid) {
            Ok(sample) => samples.push(sample),
            Err(SampleError::ProcessVanished(_)) => vanished += 1,
            Err(err) => tracing::debug!(pid, error = %err, "skipping unreadable process"),
        }
    }
    if vanished > 0 {
        tracing::trace!(vanished, "processes exited during enumeration");
    }

    Ok(RawCycle {
        system_total_ticks,
        samples,
    })
}

/// Matches each cycle's processes against the previous cycle by pid.
#[derive(Debug)]
pub struct ProcessRegistry {
    prev: HashMap<Pid, ProcessRawSample>,
    prev_system_total: Option<u64>,
    max_tracked: usize,
    clock_ticks: u64,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRACKED)
    }
}

impl ProcessRegistry {
    pub fn new(max_tracked: usize) -> Self {
        Self {
            prev: HashMap::new(),
            prev_system_total: None,
            max_tracked,
            clock_ticks: platform::clock_ticks_per_second(),
        }
    }

    pub fn with_clock_ticks(mut self, clock_ticks: u64) -> Self {
        self.clock_ticks = clock_ticks.max(1);
        self
    }

    pub fn max_tracked(&self) -> usize {
        self.max_tracked
    }

    /// Reads one cycle from `source` and computes its metrics.
    pub fn refresh(&mut self, source: &dyn CounterSource) -> Result<Vec<ProcessMetrics>, SampleError> {
        let raw = read_cycle(source, self.max_tracked)?;
        Ok(self.cycle(raw))
    }

    /// Computes metrics for `raw` against the previous cycle, then replaces
    /// the previous-sample map with exactly this cycle's samples.
    pub fn cycle(&mut self, raw: RawCycle) -> Vec<ProcessMetrics> {
        let system_diff = match self.prev_system_total {
            Some(prev) if raw.system_total_ticks > prev => raw.system_total_ticks - prev,
            _ => 0,
        };

        let metrics = raw
            .samples
            .iter()
            .map(|cur| {
                let prev_ticks = self.prev.get(&cur.pid).map(ProcessRawSample::total_ticks);
                ProcessMetrics {
                    pid: cur.pid,
                    name: cur.name.clone(),
                    cpu_usage_pct: compute_process_cpu(prev_ticks, cur.total_ticks(), system_diff),
                    memory_bytes: cur.resident_bytes,
                    priority: cur.priority,
                    state: cur.state,
                    cpu_time: ticks_to_duration(cur.total_ticks(), self.clock_ticks),
                }
            })
            .collect();

        self.prev = raw
            .samples
            .into_iter()
            .map(|sample| (sample.pid, sample))
            .collect();
        self.prev_system_total = Some(raw.system_total_ticks);

        metrics
    }

    pub fn is_tracked(&self, pid: Pid) -> bool {
        self.prev.contains_key(&pid)
    }

    pub fn tracked_pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.prev.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn len(&self) -> usize {
        self.prev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prev.is_empty()
    }
}

fn ticks_to_duration(ticks: u64, clock_ticks: u64) -> Duration {
    let secs = ticks / clock_ticks;
    let rem = ticks % clock_ticks;
    Duration::from_secs(secs) + Duration::from_nanos(rem * 1_000_000_000 / clock_ticks)
}
