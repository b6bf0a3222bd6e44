pub mod alerts;
pub mod counters;
pub mod error;
pub mod notify;
pub mod platform;
pub mod registry;
pub mod sampler;
pub mod scheduler;
pub mod snapshot;
pub mod source;
pub mod store;

pub use counters::{CpuSample, MemorySample, Pid, ProcessRawSample};
pub use error::{Family, SampleError};
pub use snapshot::{CpuMetrics, FamilyStatus, MemoryMetrics, ProcessMetrics, Snapshot};
pub use source::{CounterSource, ProcfsSource};
pub use store::MetricsStore;
