use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use super::error::{Family, SampleError};
use super::snapshot::{CpuMetrics, FamilyStatus, MemoryMetrics, ProcessMetrics, Snapshot};

#[derive(Debug, Default)]
struct Slot<T> {
    value: T,
    status: FamilyStatus,
}

impl<T> Slot<T> {
    fn replace(&mut self, value: T, now: Instant) {
        self.value = value;
        self.status.cycles += 1;
        self.status.last_updated = Some(now);
        self.status.last_error = None;
    }
}

/// Latest metrics of every family, one lock per family.
///
/// Each setter swaps the whole family value under that family's write lock,
/// so a reader never sees a process list spliced from two cycles, and a slow
/// process-table write never blocks CPU or memory writers.
#[derive(Debug, Default)]
pub struct MetricsStore {
    cpu: RwLock<Slot<CpuMetrics>>,
    memory: RwLock<Slot<MemoryMetrics>>,
    processes: RwLock<Slot<Vec<ProcessMetrics>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cpu(&self, metrics: CpuMetrics) {
        write(&self.cpu).replace(metrics, Instant::now());
    }

    pub fn set_memory(&self, metrics: MemoryMetrics) {
        write(&self.memory).replace(metrics, Instant::now());
    }

    pub fn set_processes(&self, processes: Vec<ProcessMetrics>) {
        write(&self.processes).replace(processes, Instant::now());
    }

    /// Keeps the family's last good value and remembers why this cycle failed.
    pub fn record_failure(&self, family: Family, err: &SampleError) {
        let message = err.to_string();
        match family {
            Family::Cpu => write(&self.cpu).status.last_error = Some(message),
            Family::Memory => write(&self.memory).status.last_error = Some(message),
            Family::Processes => write(&self.processes).status.last_error = Some(message),
        }
    }

    pub fn status(&self, family: Family) -> FamilyStatus {
        match family {
            Family::Cpu => read(&self.cpu).status.clone(),
            Family::Memory => read(&self.memory).status.clone(),
            Family::Processes => read(&self.processes).status.clone(),
        }
    }

    /// Copies every family out, holding each read lock only for its own copy.
    pub fn snapshot(&self) -> Snapshot {
        let (cpu, cpu_status) = {
            let slot = read(&self.cpu);
            (slot.value, slot.status.clone())
        };
        let (memory, memory_status) = {
            let slot = read(&self.memory);
            (slot.value, slot.status.clone())
        };
        let (processes, process_status) = {
            let slot = read(&self.processes);
            (slot.value.clone(), slot.status.clone())
        };

        Snapshot {
            cpu,
            memory,
            process_count: processes.len(),
            processes,
            cpu_status,
            memory_status,
            process_status,
        }
    }
}
