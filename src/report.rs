//! Plain-text rendering of a [`Snapshot`] for headless runs.

use std::fmt::Write;

use crate::format::{format_bytes, format_cpu_time, truncate_unicode};
use crate::system::Snapshot;

/// Renders the system figures and the `top` busiest processes. Families
/// named in `stale` get the same `(stale)` marker as the TUI header.
pub fn render_text(snapshot: &Snapshot, cycle: u64, top: usize, stale: &[&str]) -> String {
    let mut out = String::new();
    let cpu = &snapshot.cpu;
    let mem = &snapshot.memory;
    let marker = |family: &'static str| {
        if stale.contains(&family) {
            " (stale)"
        } else {
            ""
        }
    };

    let _ = writeln!(
        out,
        "cycle {cycle}: cpu user {:.1}% system {:.1}% idle {:.1}% iowait {:.1}%{}",
        cpu.user_pct,
        cpu.system_pct,
        cpu.idle_pct,
        cpu.iowait_pct,
        marker("cpu")
    );
    let _ = writeln!(
        out,
        "memory total {} used {} free {} cached {} swap {}{}",
        format_bytes(mem.total),
        format_bytes(mem.used),
        format_bytes(mem.free),
        format_bytes(mem.cached),
        format_bytes(mem.swap_used),
        marker("memory")
    );
    if stale.contains(&"processes") {
        let _ = writeln!(out, "processes (stale)");
    }

    let mut rows: Vec<_> = snapshot.processes.iter().collect();
    rows.sort_by(|a, b| {
        b.cpu_usage_pct
            .total_cmp(&a.cpu_usage_pct)
            .then(a.pid.cmp(&b.pid))
    });

    let _ = writeln!(
        out,
        "{:>7} {:<20} {:>1} {:>4} {:>6} {:>10} {:>10}",
        "PID", "NAME", "S", "PRI", "CPU%", "MEM", "TIME+"
    );
    for p in rows.into_iter().take(top) {
        let _ = writeln!(
            out,
            "{:>7} {:<20} {:>1} {:>4} {:>6.1} {:>10} {:>10}",
            p.pid,
            truncate_unicode(&p.name, 20),
            p.state,
            p.priority,
            p.cpu_usage_pct,
            format_bytes(p.memory_bytes),
            format_cpu_time(p.cpu_time)
        );
    }
    out
}
