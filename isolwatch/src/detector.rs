use std::fmt;

use log::{info, warn};

use crate::isolation::IsolatedCpuSet;
use crate::monitored::MonitoredSet;
use crate::remediation::{Remediation, Violation};
use crate::sources::{CpuSnapshot, RunState, RunnableTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ok,
    Starving,
    AlreadyMonitored,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::Starving => "STARVING",
            Self::AlreadyMonitored => "ALREADY-MONITORED",
        })
    }
}

/// One evaluated task, as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub comm: String,
    pub pid: u32,
    pub cpu: u32,
    pub state: RunState,
    pub classification: Classification,
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "comm={} pid={} cpu={} state={} -- {}",
            self.comm, self.pid, self.cpu, self.state, self.classification
        )
    }
}

/// Decide what a running PID means. Does not touch the monitored set.
pub fn classify(
    snapshot: &CpuSnapshot,
    isolated: &IsolatedCpuSet,
    monitored: &MonitoredSet,
) -> Classification {
    if monitored.contains(snapshot.pid) {
        Classification::AlreadyMonitored
    } else if isolated.contains(snapshot.cpu) {
        Classification::Starving
    } else {
        Classification::Ok
    }
}

/// Classify a resolved task and act on a new violation.
///
/// A starving PID is inserted into `monitored` before the remediation hook
/// runs, so the hook fires once per transition into the set. A failing hook
/// is logged and the PID stays monitored.
pub fn evaluate(
    task: &RunnableTask,
    snapshot: CpuSnapshot,
    state: RunState,
    isolated: &IsolatedCpuSet,
    monitored: &mut MonitoredSet,
    remediation: &dyn Remediation,
) -> (TaskReport, Option<Violation>) {
    let classification = classify(&snapshot, isolated, monitored);

    let violation = match classification {
        Classification::Starving => {
            monitored.insert(snapshot.pid, state);
            let violation = Violation {
                pid: snapshot.pid,
                comm: task.comm.clone(),
                cpu: snapshot.cpu,
                state,
            };
            info!(
                "comm={} pid={} cpu={} state={} -- will starve isolated cpu",
                violation.comm, violation.pid, violation.cpu, violation.state
            );
            if let Err(e) = remediation.apply(&violation) {
                warn!("{}", e);
            }
            Some(violation)
        }
        Classification::Ok | Classification::AlreadyMonitored => None,
    };

    let report = TaskReport {
        comm: task.comm.clone(),
        pid: snapshot.pid,
        cpu: snapshot.cpu,
        state,
        classification,
    };

    (report, violation)
}
