//! Delta arithmetic turning cumulative counters into percentages.

use super::counters::{CpuSample, MemorySample};
use super::snapshot::{CpuMetrics, MemoryMetrics};

/// Percentages of the tick delta between two aggregate CPU samples.
///
/// Returns all zeros for the first sample and whenever the total did not
/// advance (counter reset or wraparound). Field deltas that went backwards
/// count as zero, and every percentage is clamped to `[0, 100]`.
pub fn compute_cpu_metrics(prev: Option<&CpuSample>, cur: &CpuSample) -> CpuMetrics {
    let Some(prev) = prev else {
        return CpuMetrics::default();
    };

    let (cur_total, prev_total) = (cur.total(), prev.total());
    if cur_total <= prev_total {
        tracing::debug!(cur_total, prev_total, "cpu counters did not advance");
        return CpuMetrics::default();
    }
    let total_diff = (cur_total - prev_total) as f64;

    let pct = |cur: u64, prev: u64| {
        (100.0 * cur.saturating_sub(prev) as f64 / total_diff).clamp(0.0, 100.0)
    };

    CpuMetrics {
        user_pct: pct(cur.user, prev.user),
        system_pct: pct(cur.system, prev.system),
        idle_pct: pct(cur.idle, prev.idle),
        iowait_pct: pct(cur.iowait, prev.iowait),
    }
}

/// CPU share of one process over the last interval.
///
/// The result is `100 * process_ticks / system_ticks`, where the system delta
/// is summed over every core. Both sides are in ticks, so no clock-rate
/// conversion is involved. This is an approximation of "share of the whole
/// machine", not per-core normalized usage: a single-threaded process pinning
/// one of eight cores reports about 12.5.
///
/// Returns 0 for a process without a prior sample, for a zero system delta,
/// and when the process counter went backwards (pid reuse).
pub fn compute_process_cpu(
    prev_total_ticks: Option<u64>,
    cur_total_ticks: u64,
    system_total_diff_ticks: u64,
) -> f64 {
    let Some(prev) = prev_total_ticks else {
        return 0.0;
    };
    if system_total_diff_ticks == 0 {
        return 0.0;
    }
    let process_diff = cur_total_ticks.saturating_sub(prev);
    100.0 * process_diff as f64 / system_total_diff_ticks as f64
}

pub fn compute_memory_metrics(sample: &MemorySample) -> MemoryMetrics {
    MemoryMetrics {
        total: sample.total_bytes,
        used: sample
            .total_bytes
            .saturating_sub(sample.free_bytes)
            .saturating_sub(sample.buffer_bytes),
        free: sample.free_bytes,
        cached: sample.buffer_bytes,
        swap_used: sample.swap_total_bytes.saturating_sub(sample.swap_free_bytes),
    }
}

/// Owns the previous aggregate CPU sample for the CPU family.
#[derive(Debug, Default)]
pub struct CpuSampler {
    prev: Option<CpuSample>,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes metrics against the previous sample, then replaces it.
    pub fn update(&mut self, cur: CpuSample) -> CpuMetrics {
        let metrics = compute_cpu_metrics(self.prev.as_ref(), &cur);
        self.prev = Some(cur);
        metrics
    }

    pub fn has_baseline(&self) -> bool {
        self.prev.is_some()
    }
}
