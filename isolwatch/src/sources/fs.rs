use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use log::debug;

use super::{CpuSnapshot, ProcessTable, RunState, SchedDebugView, stat::parse_stat};
use crate::error::{MonitorError, Result};

pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Newer kernels moved the view from procfs to debugfs.
pub const DEFAULT_SCHED_DEBUG_PATHS: [&str; 2] =
    ["/proc/sched_debug", "/sys/kernel/debug/sched/debug"];

/// Read a whole file, giving up after `timeout`.
///
/// The file is opened, read and closed within the call.
pub async fn read_bounded(path: &Path, timeout: Duration) -> io::Result<Vec<u8>> {
    match tokio::time::timeout(timeout, tokio::fs::read(path)).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("read did not finish within {:?}", timeout),
        )),
    }
}

/// `ProcessTable` backed by the live proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    sched_debug_paths: Vec<PathBuf>,
    read_timeout: Duration,
}

impl ProcFs {
    pub fn new(
        root: impl Into<PathBuf>,
        sched_debug_paths: Vec<PathBuf>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            root: root.into(),
            sched_debug_paths,
            read_timeout,
        }
    }

    fn stat_path(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string()).join("stat")
    }
}

impl ProcessTable for ProcFs {
    async fn snapshot(&self, pid: u32) -> Result<(CpuSnapshot, RunState)> {
        let path = self.stat_path(pid);
        let record = read_bounded(&path, self.read_timeout).await.map_err(|e| {
            debug!("Failed to read {}: {}", path.display(), e);
            MonitorError::ProcessNotFound { pid }
        })?;
        parse_stat(pid, &record)
    }

    async fn sched_debug(&self) -> Result<SchedDebugView> {
        let mut last_err = None;
        for path in &self.sched_debug_paths {
            match read_bounded(path, self.read_timeout).await {
                Ok(bytes) => {
                    return Ok(SchedDebugView::new(String::from_utf8_lossy(&bytes)));
                }
                Err(e) => {
                    debug!("Scheduler debug view {} unavailable: {}", path.display(), e);
                    last_err = Some(MonitorError::source_unavailable(path, e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            MonitorError::source_unavailable(
                "<none>",
                io::Error::new(io::ErrorKind::NotFound, "no scheduler debug path configured"),
            )
        }))
    }
}
