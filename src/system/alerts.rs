//! CPU threshold alerts over the process table.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::counters::Pid;
use super::snapshot::ProcessMetrics;

pub const DEFAULT_CPU_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub pid: Pid,
    pub name: String,
    pub cpu_usage_pct: f64,
    pub threshold: f64,
}

impl AlertEvent {
    pub const TITLE: &'static str = "CPU ALERT";

    pub fn message(&self) -> String {
        format!(
            "Process PID {} is using too much CPU!\nCurrent usage: {:.2}%\nThreshold: {:.2}%",
            self.pid, self.cpu_usage_pct, self.threshold
        )
    }
}

/// Emits one event per process whose CPU usage is strictly above the
/// threshold.
///
/// With `cooldown_cycles == 0` every cycle is evaluated independently, so a
/// process that stays hot re-alerts each cycle. With `cooldown_cycles = N` a
/// pid that alerted at cycle `c` stays quiet until cycle `c + N`; dropping
/// below the threshold or leaving the process list resets it.
#[derive(Debug)]
pub struct AlertEvaluator {
    threshold: f64,
    cooldown_cycles: u64,
    cycle: u64,
    last_fired: HashMap<Pid, u64>,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_CPU_THRESHOLD, 0)
    }
}

impl AlertEvaluator {
    pub fn new(threshold: f64, cooldown_cycles: u64) -> Self {
        Self {
            threshold,
            cooldown_cycles,
            cycle: 0,
            last_fired: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn evaluate(&mut self, processes: &[ProcessMetrics]) -> Vec<AlertEvent> {
        self.cycle += 1;
        let mut events = Vec::new();
        let mut breaching = HashSet::new();

        for process in processes {
            if process.cpu_usage_pct <= self.threshold {
                continue;
            }
            breaching.insert(process.pid);

            if self.cooldown_cycles > 0 {
                if let Some(&fired_at) = self.last_fired.get(&process.pid)
                    && self.cycle - fired_at < self.cooldown_cycles
                {
                    continue;
                }
                self.last_fired.insert(process.pid, self.cycle);
            }

            events.push(AlertEvent {
                pid: process.pid,
                name: process.name.clone(),
                cpu_usage_pct: process.cpu_usage_pct,
                threshold: self.threshold,
            });
        }

        self.last_fired.retain(|pid, _| breaching.contains(pid));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn process(pid: Pid, cpu: f64) -> ProcessMetrics {
        ProcessMetrics {
            pid,
            name: format!("p{pid}"),
            cpu_usage_pct: cpu,
            memory_bytes: 0,
            priority: 20,
            state: 'R',
            cpu_time: Duration::ZERO,
        }
    }

    #[test]
    fn single_breach_emits_one_event() {
        let mut evaluator = AlertEvaluator::new(70.0, 0);
        let events = evaluator.evaluate(&[process(42, 85.0), process(7, 12.0)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pid, 42);
        assert_eq!(events[0].cpu_usage_pct, 85.0);
        assert_eq!(events[0].threshold, 70.0);
    }

    #[test]
    fn one_event_per_breaching_process() {
        let mut evaluator = AlertEvaluator::new(70.0, 0);
        assert_eq!(evaluator.threshold(), 70.0);
        let events = evaluator.evaluate(&[
            process(3, 95.5),
            process(8, 30.0),
            process(11, 71.0),
            process(20, 100.0),
        ]);
        let pids: Vec<Pid> = events.iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![3, 11, 20]);
        assert!(events.iter().all(|e| e.threshold == 70.0));
        assert_eq!(events[1].cpu_usage_pct, 71.0);

        // the next cycle fires again for each, once
        assert_eq!(evaluator.evaluate(&[process(3, 95.5), process(11, 71.0)]).len(), 2);
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut evaluator = AlertEvaluator::default();
        assert!(evaluator.evaluate(&[process(1, 70.0)]).is_empty());
        assert_eq!(evaluator.evaluate(&[process(1, 70.01)]).len(), 1);
    }

    #[test]
    fn stateless_by_default_refires_every_cycle() {
        let mut evaluator = AlertEvaluator::default();
        for _ in 0..3 {
            assert_eq!(evaluator.evaluate(&[process(5, 99.0)]).len(), 1);
        }
    }

    #[test]
    fn cooldown_suppresses_repeats() {
        let mut evaluator = AlertEvaluator::new(70.0, 3);
        let hot = [process(5, 90.0)];
        let fired: Vec<usize> = (0..7).map(|_| evaluator.evaluate(&hot).len()).collect();
        assert_eq!(fired, vec![1, 0, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn cooldown_resets_when_process_cools_down() {
        let mut evaluator = AlertEvaluator::new(70.0, 10);
        assert_eq!(evaluator.evaluate(&[process(5, 90.0)]).len(), 1);
        assert!(evaluator.evaluate(&[process(5, 10.0)]).is_empty());
        assert_eq!(evaluator.evaluate(&[process(5, 90.0)]).len(), 1);
    }

    #[test]
    fn message_format() {
        let event = AlertEvent {
            pid: 42,
            name: "spin".into(),
            cpu_usage_pct: 85.0,
            threshold: 70.0,
        };
        insta::assert_snapshot!(event.message(), @r"
        Process PID 42 is using too much CPU!
        Current usage: 85.00%
        Threshold: 70.00%
        ");
    }
}
