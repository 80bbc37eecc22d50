//! The set of processes currently believed to starve an isolated CPU.
//!
//! This is the only state that survives from one tick to the next. A PID is
//! in the set iff it was seen running on an isolated CPU and has neither
//! exited nor left the running state since.

use std::{collections::BTreeMap, fmt};

use log::info;

use crate::sources::{ProcessTable, RunState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredEntry {
    pub pid: u32,
    pub last_state: RunState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The process record could not be read any more.
    Exited,
    /// The process is no longer running.
    StateChanged(RunState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub pid: u32,
    pub reason: RemovalReason,
}

impl fmt::Display for Removal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            RemovalReason::Exited => write!(f, "pid={} exited", self.pid)?,
            RemovalReason::StateChanged(state) => {
                write!(f, "pid={} state={}", self.pid, state)?
            }
        }
        f.write_str(" -- removed from monitored")
    }
}

#[derive(Debug, Default)]
pub struct MonitoredSet {
    entries: BTreeMap<u32, RunState>,
}

impl MonitoredSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.entries.contains_key(&pid)
    }

    /// Start tracking `pid`. Returns false if it was already tracked.
    pub fn insert(&mut self, pid: u32, state: RunState) -> bool {
        if self.entries.contains_key(&pid) {
            return false;
        }
        self.entries.insert(pid, state);
        true
    }

    #[cfg(test)]
    pub(crate) fn get(&self, pid: u32) -> Option<MonitoredEntry> {
        self.entries.get(&pid).map(|state| MonitoredEntry {
            pid,
            last_state: *state,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked entries in ascending PID order.
    pub fn entries(&self) -> impl Iterator<Item = MonitoredEntry> + '_ {
        self.entries.iter().map(|(&pid, &last_state)| MonitoredEntry { pid, last_state })
    }

    /// Tracked PIDs in ascending order.
    pub fn pids(&self) -> Vec<u32> {
        self.entries().map(|entry| entry.pid).collect()
    }

    /// Re-read every tracked PID and drop the ones that exited or stopped running.
    ///
    /// Runs over the whole set regardless of what the current scan saw.
    pub async fn reconcile<T: ProcessTable>(&mut self, table: &T) -> Vec<Removal> {
        let mut removals = Vec::new();

        for pid in self.pids() {
            let reason = match table.snapshot(pid).await {
                Err(_) => {
                    info!("Couldn't read proc entry for pid {} -- removing from monitored", pid);
                    Some(RemovalReason::Exited)
                }
                Ok((_, state)) if !state.is_running() => {
                    info!(
                        "Status change for pid {} ({}) -- removing from monitored",
                        pid, state
                    );
                    Some(RemovalReason::StateChanged(state))
                }
                Ok((_, state)) => {
                    self.entries.insert(pid, state);
                    None
                }
            };

            if let Some(reason) = reason {
                self.entries.remove(&pid);
                removals.push(Removal { pid, reason });
            }
        }

        removals
    }
}
