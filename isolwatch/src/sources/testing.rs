use std::{collections::HashMap, io, sync::Mutex};

use super::{CpuSnapshot, ProcessTable, RunState, SchedDebugView};
use crate::error::{MonitorError, Result};

/// In-memory process table for pipeline tests.
#[derive(Default)]
pub struct FakeTable {
    processes: Mutex<HashMap<u32, (u32, RunState)>>,
    view: Mutex<Option<String>>,
}

impl FakeTable {
    pub fn set_process(&self, pid: u32, cpu: u32, state: char) {
        self.processes
            .lock()
            .unwrap()
            .insert(pid, (cpu, RunState::from_code(state)));
    }

    pub fn remove_process(&self, pid: u32) {
        self.processes.lock().unwrap().remove(&pid);
    }

    /// Replace the debug view with `>R` lines for the given tasks.
    pub fn set_running(&self, tasks: &[(u32, &str)]) {
        let text = tasks
            .iter()
            .map(|(pid, comm)| format!(">R {:>15} {:>5} 10.000000 1 120\n", comm, pid))
            .collect::<String>();
        *self.view.lock().unwrap() = Some(text);
    }

    pub fn make_view_unavailable(&self) {
        *self.view.lock().unwrap() = None;
    }
}

impl ProcessTable for FakeTable {
    async fn snapshot(&self, pid: u32) -> Result<(CpuSnapshot, RunState)> {
        self.processes
            .lock()
            .unwrap()
            .get(&pid)
            .map(|(cpu, state)| (CpuSnapshot { pid, cpu: *cpu }, *state))
            .ok_or(MonitorError::ProcessNotFound { pid })
    }

    async fn sched_debug(&self) -> Result<SchedDebugView> {
        match self.view.lock().unwrap().as_ref() {
            Some(text) => Ok(SchedDebugView::new(text.clone())),
            None => Err(MonitorError::source_unavailable(
                "/proc/sched_debug",
                io::Error::new(io::ErrorKind::PermissionDenied, "fake"),
            )),
        }
    }
}
