use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::counters::{CpuSample, MemorySample, Pid, ProcessRawSample};
use super::error::SampleError;
use super::platform;

/// Reads raw counters from the OS.
///
/// Implementations must be cheap to share between the family tasks; every
/// method is called from the blocking pool.
pub trait CounterSource: Send + Sync {
    fn read_cpu_counters(&self) -> Result<CpuSample, SampleError>;
    fn read_memory_info(&self) -> Result<MemorySample, SampleError>;
    fn enumerate_processes(&self) -> Result<Vec<Pid>, SampleError>;
    fn read_process_raw(&self, pid: Pid) -> Result<ProcessRawSample, SampleError>;
}

/// Counter source backed by a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    root: PathBuf,
    page_size: u64,
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcfsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: platform::page_size(),
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_family_file(&self, name: &str) -> Result<(PathBuf, String), SampleError> {
        let path = self.root.join(name);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok((path, contents)),
            Err(source) => Err(SampleError::SourceUnavailable { path, source }),
        }
    }

    fn resident_bytes(&self, pid: Pid) -> u64 {
        let pid_dir = self.root.join(pid.to_string());
        if let Ok(statm) = fs::read_to_string(pid_dir.join("statm"))
            && let Some(pages) = parse_statm_resident(&statm)
        {
            return pages.saturating_mul(self.page_size);
        }
        // Some sandboxes hide statm; status carries the same figure in kB.
        fs::read_to_string(pid_dir.join("status"))
            .ok()
            .and_then(|status| parse_status_vm_rss_kb(&status))
            .map(|kb| kb.saturating_mul(1024))
            .unwrap_or(0)
    }
}

impl CounterSource for ProcfsSource {
    fn read_cpu_counters(&self) -> Result<CpuSample, SampleError> {
        let (path, contents) = self.read_family_file("stat")?;
        let line = contents
            .lines()
            .find(|line| line.starts_with("cpu "))
            .ok_or_else(|| SampleError::malformed(&path, "no aggregate cpu line"))?;
        parse_cpu_line(line).map_err(|detail| SampleError::malformed(&path, detail))
    }

    fn read_memory_info(&self) -> Result<MemorySample, SampleError> {
        let (path, contents) = self.read_family_file("meminfo")?;
        parse_meminfo(&contents).map_err(|detail| SampleError::malformed(&path, detail))
    }

    fn enumerate_processes(&self) -> Result<Vec<Pid>, SampleError> {
        let entries = fs::read_dir(&self.root).map_err(|source| SampleError::SourceUnavailable {
            path: self.root.clone(),
            source,
        })?;

        let mut pids: Vec<Pid> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str()?.parse::<Pid>().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn read_process_raw(&self, pid: Pid) -> Result<ProcessRawSample, SampleError> {
        let path = self.root.join(pid.to_string()).join("stat");
        let contents = fs::read_to_string(&path).map_err(|err| vanished_or(pid, &path, err))?;
        let mut sample =
            parse_pid_stat(pid, &contents).map_err(|detail| SampleError::malformed(&path, detail))?;
        sample.resident_bytes = self.resident_bytes(pid);
        Ok(sample)
    }
}

// A pid directory disappears as a unit, so any error on its files means the
// process is gone. Anything else under a live pid dir would be a kernel bug.
fn vanished_or(pid: Pid, path: &Path, err: io::Error) -> SampleError {
    tracing::trace!(pid, path = %path.display(), error = %err, "pid read failed");
    SampleError::ProcessVanished(pid)
}

/// Parses the aggregate `cpu` line of `/proc/stat`. All ten counters are
/// required.
pub fn parse_cpu_line(line: &str) -> Result<CpuSample, String> {
    let mut fields = line.split_whitespace();
    match fields.next() {
        Some("cpu") => {}
        other => return Err(format!("expected `cpu` label, found {other:?}")),
    }

    let mut values = [0u64; 10];
    for (i, slot) in values.iter_mut().enumerate() {
        let raw = fields
            .next()
            .ok_or_else(|| format!("expected 10 counters, found {i}"))?;
        *slot = raw
            .parse()
            .map_err(|_| format!("counter {i} is not a number: {raw:?}"))?;
    }

    let [user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice] = values;
    Ok(CpuSample {
        user,
        nice,
        system,
        idle,
        iowait,
        irq,
        softirq,
        steal,
        guest,
        guest_nice,
    })
}

pub fn parse_meminfo(contents: &str) -> Result<MemorySample, String> {
    let mut total = None;
    let mut free = None;
    let mut buffers = None;
    let mut swap_total = None;
    let mut swap_free = None;

    for line in contents.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut total,
            "MemFree" => &mut free,
            "Buffers" => &mut buffers,
            "SwapTotal" => &mut swap_total,
            "SwapFree" => &mut swap_free,
            _ => continue,
        };
        let kb: u64 = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| format!("unreadable value for {}", key.trim()))?;
        *slot = Some(kb.saturating_mul(1024));
    }

    let require = |value: Option<u64>, key: &str| value.ok_or_else(|| format!("missing {key}"));
    Ok(MemorySample {
        total_bytes: require(total, "MemTotal")?,
        free_bytes: require(free, "MemFree")?,
        buffer_bytes: require(buffers, "Buffers")?,
        swap_total_bytes: require(swap_total, "SwapTotal")?,
        swap_free_bytes: require(swap_free, "SwapFree")?,
    })
}

/// Parses `/proc/<pid>/stat`. Resident memory is filled in separately.
pub fn parse_pid_stat(pid: Pid, contents: &str) -> Result<ProcessRawSample, String> {
    // comm may itself contain spaces and parens, so anchor on the last ')'
    let open = contents.find('(').ok_or("missing comm")?;
    let close = contents.rfind(')').ok_or("unterminated comm")?;
    if close < open {
        return Err("unterminated comm".to_string());
    }
    let name = contents[open + 1..close].to_string();

    // Fields after comm: state(0) ppid(1) pgrp(2) session(3) tty_nr(4)
    // tpgid(5) flags(6) minflt(7) cminflt(8) majflt(9) cmajflt(10)
    // utime(11) stime(12) cutime(13) cstime(14) priority(15)
    let fields: Vec<&str> = contents[close + 1..].split_whitespace().collect();
    if fields.len() < 16 {
        return Err(format!("expected at least 16 fields, found {}", fields.len()));
    }

    let state = fields[0].chars().next().ok_or("empty state")?;
    let number = |idx: usize| -> Result<u64, String> {
        fields[idx]
            .parse()
            .map_err(|_| format!("field {idx} is not a number: {:?}", fields[idx]))
    };
    let priority: i64 = fields[15]
        .parse()
        .map_err(|_| format!("priority is not a number: {:?}", fields[15]))?;

    Ok(ProcessRawSample {
        pid,
        name,
        utime_ticks: number(11)?,
        stime_ticks: number(12)?,
        resident_bytes: 0,
        priority,
        state,
    })
}

/// Resident set size in pages, the second column of `statm`.
pub fn parse_statm_resident(contents: &str) -> Option<u64> {
    contents.split_whitespace().nth(1)?.parse().ok()
}

pub fn parse_status_vm_rss_kb(contents: &str) -> Option<u64> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|v| v.parse().ok())
}
