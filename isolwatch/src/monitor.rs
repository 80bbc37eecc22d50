use log::{debug, info, warn};

use crate::detector;
use crate::isolation::IsolatedCpuSet;
use crate::monitored::MonitoredSet;
use crate::remediation::Remediation;
use crate::report::TickReport;
use crate::sources::ProcessTable;

/// Per-run detection context, owned by the polling loop.
pub struct Monitor<T: ProcessTable> {
    table: T,
    isolated: IsolatedCpuSet,
    monitored: MonitoredSet,
    remediation: Box<dyn Remediation>,
}

impl<T: ProcessTable> Monitor<T> {
    pub fn new(table: T, isolated: IsolatedCpuSet, remediation: Box<dyn Remediation>) -> Self {
        Self {
            table,
            isolated,
            monitored: MonitoredSet::new(),
            remediation,
        }
    }

    pub fn isolated(&self) -> &IsolatedCpuSet {
        &self.isolated
    }

    pub fn monitored(&self) -> &MonitoredSet {
        &self.monitored
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> &T {
        &self.table
    }

    /// Wait for remediation work still running in the background.
    ///
    /// Every task is bounded by the hook's own timeout.
    pub async fn finish(&self) {
        if let Some(mut pending) = self.remediation.take_pending() {
            info!("Waiting for {} remediation task(s)", pending.len());
            while let Some(res) = pending.join_next().await {
                if let Err(e) = res {
                    warn!("Remediation task failed: {}", e);
                }
            }
        }
    }

    /// Run one polling tick: scan, detect, reconcile.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            isolated: self.isolated.as_slice().to_vec(),
            ..Default::default()
        };

        match self.table.sched_debug().await {
            Ok(view) => {
                report.scan_available = true;
                for task in view.runnable_tasks() {
                    let (snapshot, state) = match self.table.snapshot(task.pid).await {
                        Ok(resolved) => resolved,
                        Err(e) => {
                            debug!("Skipping {} ({}): {}", task.comm, task.pid, e);
                            continue;
                        }
                    };

                    let (line, violation) = detector::evaluate(
                        &task,
                        snapshot,
                        state,
                        &self.isolated,
                        &mut self.monitored,
                        self.remediation.as_ref(),
                    );
                    report.tasks.push(line);
                    report.violations.extend(violation);
                }
            }
            Err(e) => warn!("Scan skipped this tick: {}", e),
        }

        report.removals = self.monitored.reconcile(&self.table).await;
        report.monitored = self.monitored.pids();
        report
    }
}
