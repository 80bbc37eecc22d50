//! Point-in-time views of the kernel's process and scheduler state.

use std::fmt;

use crate::error::Result;

pub mod fs;
pub mod sched_debug;
pub mod stat;
#[cfg(test)]
pub(crate) mod testing;

pub use fs::ProcFs;
pub use sched_debug::SchedDebugView;

/// CPU a process last executed on at sample time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub pid: u32,
    pub cpu: u32,
}

/// Single-character kernel run state, as shown in `/proc/<pid>/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    TracingStop,
    Zombie,
    Dead,
    Idle,
    Parked,
    Waking,
    Other(char),
}

impl RunState {
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => Self::Running,
            'S' => Self::Sleeping,
            'D' => Self::DiskSleep,
            'T' => Self::Stopped,
            't' => Self::TracingStop,
            'Z' => Self::Zombie,
            'X' | 'x' => Self::Dead,
            'I' => Self::Idle,
            'P' => Self::Parked,
            'W' => Self::Waking,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> char {
        match self {
            Self::Running => 'R',
            Self::Sleeping => 'S',
            Self::DiskSleep => 'D',
            Self::Stopped => 'T',
            Self::TracingStop => 't',
            Self::Zombie => 'Z',
            Self::Dead => 'X',
            Self::Idle => 'I',
            Self::Parked => 'P',
            Self::Waking => 'W',
            Self::Other(c) => *c,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One runnable task line of the scheduler debug view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnableTask {
    pub pid: u32,
    pub comm: String,
}

/// Where the monitor gets its kernel state from.
///
/// Every call goes back to the source; implementations must not cache
/// per-PID answers across calls since PIDs get reused.
#[allow(async_fn_in_trait)]
pub trait ProcessTable {
    /// Current CPU and run state of `pid`.
    ///
    /// Fails with `ProcessNotFound` when the record is gone or malformed.
    async fn snapshot(&self, pid: u32) -> Result<(CpuSnapshot, RunState)>;

    /// Fresh copy of the scheduler debug view.
    ///
    /// Fails with `SourceUnavailable` when no candidate view can be read.
    async fn sched_debug(&self) -> Result<SchedDebugView>;
}
