//! One periodic task per metric family, all writing into a shared
//! [`MetricsStore`].
//!
//! Each task owns its family's previous-sample state, so a family is only
//! ever written by one task and cycle N's write happens-before cycle N+1's
//! read of the previous sample. Counter reads run on the blocking pool under
//! an I/O timeout so a stuck procfs read cannot starve the other families.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::alerts::{AlertEvaluator, AlertEvent, DEFAULT_CPU_THRESHOLD};
use super::error::{Family, SampleError};
use super::registry::{DEFAULT_MAX_TRACKED, ProcessRegistry, read_cycle};
use super::sampler::{CpuSampler, compute_memory_metrics};
use super::source::CounterSource;
use super::store::MetricsStore;

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub cpu_interval: Duration,
    pub memory_interval: Duration,
    pub process_interval: Duration,
    pub io_timeout: Duration,
    pub max_tracked_processes: usize,
    pub cpu_alert_threshold: f64,
    pub alert_cooldown_cycles: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let interval = Duration::from_millis(1000);
        SchedulerConfig {
            cpu_interval: interval,
            memory_interval: interval,
            process_interval: interval,
            io_timeout: Duration::from_millis(500),
            max_tracked_processes: DEFAULT_MAX_TRACKED,
            cpu_alert_threshold: DEFAULT_CPU_THRESHOLD,
            alert_cooldown_cycles: 0,
        }
    }
}

/// Cancellation signal observed by every family task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is triggered or the trigger is dropped.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}

/// Sleeps for `interval` unless shutdown comes first. Returns whether the
/// task should run another cycle.
async fn pace(shutdown: &mut Shutdown, interval: Duration) -> bool {
    let slept = tokio::select! {
        _ = tokio::time::sleep(interval) => true,
        _ = shutdown.wait() => false,
    };
    slept && !shutdown.is_triggered()
}

#[derive(Clone)]
struct TaskContext {
    source: Arc<dyn CounterSource>,
    store: Arc<MetricsStore>,
    io_timeout: Duration,
}

impl TaskContext {
    fn family_failed(&self, family: Family, err: &SampleError) {
        tracing::warn!(%family, error = %err, "sampling cycle failed, keeping last good value");
        self.store.record_failure(family, err);
    }
}

/// Runs a family's blocking counter reads, at most one at a time.
///
/// A read that outlives `io_timeout` is kept rather than abandoned: later
/// cycles wait on that same read instead of starting another, so a stuck
/// procfs file ties up one blocking thread per family, not one per cycle.
struct BlockingReader<T> {
    family: Family,
    in_flight: Option<JoinHandle<Result<T, SampleError>>>,
}

impl<T: Send + 'static> BlockingReader<T> {
    fn new(family: Family) -> Self {
        Self {
            family,
            in_flight: None,
        }
    }

    fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    async fn read<F>(&mut self, ctx: &TaskContext, read: F) -> Result<T, SampleError>
    where
        F: FnOnce(&dyn CounterSource) -> Result<T, SampleError> + Send + 'static,
    {
        let mut task = match self.in_flight.take() {
            Some(task) => {
                tracing::debug!(family = %self.family, "previous read still outstanding");
                task
            }
            None => {
                let source = Arc::clone(&ctx.source);
                tokio::task::spawn_blocking(move || read(source.as_ref()))
            }
        };

        match tokio::time::timeout(ctx.io_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(SampleError::Interrupted {
                family: self.family,
                detail: join_err.to_string(),
            }),
            Err(_) => {
                self.in_flight = Some(task);
                Err(SampleError::Timeout {
                    family: self.family,
                    after: ctx.io_timeout,
                })
            }
        }
    }
}

fn abandon_if_pending<T: Send + 'static>(reader: &BlockingReader<T>) {
    if reader.is_pending() {
        tracing::warn!(family = %reader.family, "stopping with a counter read still blocked");
    }
}

async fn cpu_task(ctx: TaskContext, interval: Duration, mut shutdown: Shutdown) {
    let mut sampler = CpuSampler::new();
    let mut reader = BlockingReader::new(Family::Cpu);
    while !shutdown.is_triggered() {
        match reader.read(&ctx, |source| source.read_cpu_counters()).await {
            Ok(sample) => ctx.store.set_cpu(sampler.update(sample)),
            Err(err) => ctx.family_failed(Family::Cpu, &err),
        }
        if !pace(&mut shutdown, interval).await {
            break;
        }
    }
    abandon_if_pending(&reader);
    tracing::debug!("cpu sampler stopped");
}

async fn memory_task(ctx: TaskContext, interval: Duration, mut shutdown: Shutdown) {
    let mut reader = BlockingReader::new(Family::Memory);
    while !shutdown.is_triggered() {
        match reader.read(&ctx, |source| source.read_memory_info()).await {
            Ok(sample) => ctx.store.set_memory(compute_memory_metrics(&sample)),
            Err(err) => ctx.family_failed(Family::Memory, &err),
        }
        if !pace(&mut shutdown, interval).await {
            break;
        }
    }
    abandon_if_pending(&reader);
    tracing::debug!("memory sampler stopped");
}

async fn process_task(
    ctx: TaskContext,
    interval: Duration,
    mut registry: ProcessRegistry,
    mut evaluator: AlertEvaluator,
    alerts: mpsc::UnboundedSender<AlertEvent>,
    mut shutdown: Shutdown,
) {
    let mut reader = BlockingReader::new(Family::Processes);
    let max_tracked = registry.max_tracked();
    while !shutdown.is_triggered() {
        match reader
            .read(&ctx, move |source| read_cycle(source, max_tracked))
            .await
        {
            Ok(raw) => {
                let metrics = registry.cycle(raw);
                let events = evaluator.evaluate(&metrics);
                tracing::debug!(
                    processes = metrics.len(),
                    alerts = events.len(),
                    threshold = evaluator.threshold(),
                    "process cycle complete"
                );
                ctx.store.set_processes(metrics);
                for event in events {
                    if alerts.send(event).is_err() {
                        tracing::trace!("alert receiver dropped");
                        break;
                    }
                }
            }
            Err(err) => ctx.family_failed(Family::Processes, &err),
        }
        if !pace(&mut shutdown, interval).await {
            break;
        }
    }
    abandon_if_pending(&reader);
    tracing::debug!("process sampler stopped");
}

/// Running family tasks plus the means to stop them.
pub struct SchedulerHandle {
    trigger: ShutdownTrigger,
    tasks: Vec<(Family, JoinHandle<()>)>,
}

impl SchedulerHandle {
    pub fn shutdown_signal(&self) -> Shutdown {
        self.trigger.subscribe()
    }

    /// Signals every task, then waits for each to finish its current cycle.
    pub async fn shutdown(self) {
        self.trigger.trigger();
        for (family, task) in self.tasks {
            if let Err(err) = task.await {
                tracing::warn!(%family, error = %err, "sampler task did not exit cleanly");
            }
        }
    }
}

/// Starts the CPU, memory and process tasks on the current runtime.
///
/// Alerts from the process family go to `alerts`; the channel closes once
/// the process task exits.
pub fn spawn(
    source: Arc<dyn CounterSource>,
    store: Arc<MetricsStore>,
    config: &SchedulerConfig,
    alerts: mpsc::UnboundedSender<AlertEvent>,
) -> SchedulerHandle {
    let (trigger, shutdown) = shutdown_channel();
    let ctx = TaskContext {
        source,
        store,
        io_timeout: config.io_timeout,
    };

    let registry = ProcessRegistry::new(config.max_tracked_processes);
    let evaluator = AlertEvaluator::new(config.cpu_alert_threshold, config.alert_cooldown_cycles);

    let tasks = vec![
        (
            Family::Cpu,
            tokio::spawn(cpu_task(ctx.clone(), config.cpu_interval, shutdown.clone())),
        ),
        (
            Family::Memory,
            tokio::spawn(memory_task(
                ctx.clone(),
                config.memory_interval,
                shutdown.clone(),
            )),
        ),
        (
            Family::Processes,
            tokio::spawn(process_task(
                ctx,
                config.process_interval,
                registry,
                evaluator,
                alerts,
                shutdown,
            )),
        ),
    ];

    SchedulerHandle { trigger, tasks }
}
