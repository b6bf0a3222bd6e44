use std::fs;
use std::path::{Path, PathBuf};

use procwatch::system::registry::{ProcessRegistry, read_cycle};
use procwatch::system::sampler::{CpuSampler, compute_memory_metrics};
use procwatch::system::{CounterSource, ProcfsSource, SampleError};

const PAGE_SIZE: u64 = 4096;

/// A throwaway procfs tree under the system temp dir.
struct FakeProc {
    root: PathBuf,
}

impl FakeProc {
    fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "procwatch_fixture_{}_{}",
            std::process::id(),
            name
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        let fake = Self { root };
        fake.write_meminfo();
        fake
    }

    fn source(&self) -> ProcfsSource {
        ProcfsSource::new(&self.root).with_page_size(PAGE_SIZE)
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn set_cpu(&self, user: u64, system: u64, idle: u64) {
        let contents = format!(
            "cpu  {user} 0 {system} {idle} 0 0 0 0 0 0\n\
             cpu0 {user} 0 {system} {idle} 0 0 0 0 0 0\n\
             intr 12345\nctxt 67890\nbtime 1700000000\n"
        );
        fs::write(self.root.join("stat"), contents).unwrap();
    }

    fn write_meminfo(&self) {
        let contents = "MemTotal:        8000000 kB\n\
                        MemFree:         3000000 kB\n\
                        MemAvailable:    5000000 kB\n\
                        Buffers:          500000 kB\n\
                        Cached:          1500000 kB\n\
                        SwapTotal:       2000000 kB\n\
                        SwapFree:        1500000 kB\n";
        fs::write(self.root.join("meminfo"), contents).unwrap();
    }

    fn set_process(&self, pid: u32, name: &str, utime: u64, stime: u64, rss_pages: u64) {
        let dir = self.root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        let stat = format!(
            "{pid} ({name}) R 1 {pid} {pid} 0 -1 4194304 100 0 0 0 \
             {utime} {stime} 0 0 20 0 1 0 100 1000000 {rss_pages}\n"
        );
        fs::write(dir.join("stat"), stat).unwrap();
        fs::write(dir.join("statm"), format!("5000 {rss_pages} 100 10 0 400 0\n")).unwrap();
    }

    fn remove_process(&self, pid: u32) {
        fs::remove_dir_all(self.root.join(pid.to_string())).unwrap();
    }
}

impl Drop for FakeProc {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

#[test]
fn cpu_metrics_from_two_stat_reads() {
    let fake = FakeProc::new("cpu");
    let source = fake.source();
    let mut sampler = CpuSampler::new();

    fake.set_cpu(100, 0, 900);
    let first = sampler.update(source.read_cpu_counters().unwrap());
    assert_eq!(first.user_pct, 0.0);
    assert_eq!(first.idle_pct, 0.0);

    fake.set_cpu(150, 0, 950);
    let second = sampler.update(source.read_cpu_counters().unwrap());
    assert!((second.user_pct - 50.0).abs() < 1e-9);
    assert!((second.idle_pct - 50.0).abs() < 1e-9);
    assert_eq!(second.system_pct, 0.0);
}

#[test]
fn memory_metrics_from_meminfo() {
    let fake = FakeProc::new("memory");
    let sample = fake.source().read_memory_info().unwrap();
    let mem = compute_memory_metrics(&sample);
    assert_eq!(mem.total, 8_000_000 * 1024);
    assert_eq!(mem.free, 3_000_000 * 1024);
    assert_eq!(mem.used, 4_500_000 * 1024);
    assert_eq!(mem.cached, 500_000 * 1024);
    assert_eq!(mem.swap_used, 500_000 * 1024);
}

#[test]
fn missing_stat_is_source_unavailable() {
    let fake = FakeProc::new("nostat");
    let err = fake.source().read_cpu_counters().unwrap_err();
    assert!(matches!(err, SampleError::SourceUnavailable { .. }));
    assert!(!err.is_per_item());
}

#[test]
fn enumeration_ignores_non_pid_entries() {
    let fake = FakeProc::new("enumerate");
    fake.set_process(30, "c", 0, 0, 1);
    fake.set_process(4, "a", 0, 0, 1);
    fake.set_process(12, "b", 0, 0, 1);
    fs::create_dir_all(fake.root().join("sys")).unwrap();
    fs::create_dir_all(fake.root().join("self")).unwrap();

    assert_eq!(fake.source().enumerate_processes().unwrap(), vec![4, 12, 30]);
}

#[test]
fn process_cpu_share_of_system_ticks() {
    let fake = FakeProc::new("share");
    let source = fake.source();
    let mut registry = ProcessRegistry::new(0).with_clock_ticks(100);

    fake.set_cpu(300, 100, 600);
    fake.set_process(42, "spin", 10, 5, 256);
    let first = registry.refresh(&source).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].cpu_usage_pct, 0.0);

    fake.set_cpu(330, 110, 660);
    fake.set_process(42, "spin", 30, 15, 256);
    let second = registry.refresh(&source).unwrap();
    let spin = &second[0];
    assert!((spin.cpu_usage_pct - 30.0).abs() < 1e-9);
    assert_eq!(spin.memory_bytes, 256 * PAGE_SIZE);
    assert_eq!(spin.name, "spin");
    assert_eq!(spin.state, 'R');
    assert_eq!(spin.priority, 20);
    assert_eq!(spin.cpu_time.as_millis(), 450);
}

#[test]
fn exited_process_leaves_the_registry() {
    let fake = FakeProc::new("exit");
    let source = fake.source();
    let mut registry = ProcessRegistry::new(0);

    fake.set_cpu(100, 0, 900);
    for pid in [1, 2, 3] {
        fake.set_process(pid, "worker", 1, 1, 1);
    }
    registry.refresh(&source).unwrap();
    assert_eq!(registry.tracked_pids(), vec![1, 2, 3]);

    fake.remove_process(2);
    fake.set_cpu(200, 0, 1000);
    let metrics = registry.refresh(&source).unwrap();
    let pids: Vec<u32> = metrics.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![1, 3]);
    assert_eq!(registry.tracked_pids(), vec![1, 3]);
    assert!(!registry.is_tracked(2));
}

#[test]
fn malformed_pid_stat_skips_only_that_process() {
    let fake = FakeProc::new("malformed");
    let source = fake.source();
    fake.set_cpu(100, 0, 900);
    fake.set_process(7, "good", 1, 1, 1);
    fake.set_process(8, "bad", 1, 1, 1);
    fs::write(fake.root().join("8").join("stat"), "8 (bad) R 1 8").unwrap();

    let err = source.read_process_raw(8).unwrap_err();
    assert!(matches!(err, SampleError::ParseMalformed { .. }));

    let cycle = read_cycle(&source, 0).unwrap();
    let pids: Vec<u32> = cycle.samples.iter().map(|s| s.pid).collect();
    assert_eq!(pids, vec![7]);
}

#[test]
fn vanished_pid_is_reported_per_item() {
    let fake = FakeProc::new("vanished");
    let err = fake.source().read_process_raw(999).unwrap_err();
    assert!(matches!(err, SampleError::ProcessVanished(999)));
    assert!(err.is_per_item());
}

#[test]
fn resident_falls_back_to_status() {
    let fake = FakeProc::new("status_rss");
    fake.set_process(5, "sandboxed", 1, 1, 1);
    let dir = fake.root().join("5");
    fs::remove_file(dir.join("statm")).unwrap();
    fs::write(dir.join("status"), "Name:\tsandboxed\nVmRSS:\t    1400 kB\n").unwrap();

    let sample = fake.source().read_process_raw(5).unwrap();
    assert_eq!(sample.resident_bytes, 1400 * 1024);
}

#[test]
fn enumeration_is_truncated_to_lowest_pids() {
    let fake = FakeProc::new("truncate");
    fake.set_cpu(100, 0, 900);
    for pid in [50, 10, 40, 20, 30] {
        fake.set_process(pid, "p", 1, 1, 1);
    }
    let mut registry = ProcessRegistry::new(3);
    let metrics = registry.refresh(&fake.source()).unwrap();
    let pids: Vec<u32> = metrics.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![10, 20, 30]);
    assert_eq!(registry.len(), 3);
}
