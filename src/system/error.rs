use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::counters::Pid;

/// Failures raised while reading OS counters.
///
/// Per-item variants (`ParseMalformed` on a pid file, `ProcessVanished`) are
/// contained to that item by the caller. `SourceUnavailable` and `Timeout`
/// degrade a whole family to its last good value.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("counter source {} unavailable: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{family} read did not finish within {after:?}")]
    Timeout { family: Family, after: Duration },

    #[error("{family} read was interrupted: {detail}")]
    Interrupted { family: Family, detail: String },

    #[error("malformed record in {}: {detail}", path.display())]
    ParseMalformed { path: PathBuf, detail: String },

    #[error("process {0} exited before it could be read")]
    ProcessVanished(Pid),
}

impl SampleError {
    pub fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        SampleError::ParseMalformed {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True for errors that only concern a single record or process.
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            SampleError::ParseMalformed { .. } | SampleError::ProcessVanished(_)
        )
    }
}

/// One of the independently scheduled metric groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Cpu,
    Memory,
    Processes,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Cpu, Family::Memory, Family::Processes];

    pub fn label(self) -> &'static str {
        match self {
            Family::Cpu => "cpu",
            Family::Memory => "memory",
            Family::Processes => "processes",
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
