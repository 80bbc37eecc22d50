//! Per-tick output.

use std::io::{self, Write};

use log::{info, warn};

use crate::detector::TaskReport;
use crate::monitored::Removal;
use crate::remediation::Violation;

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

/// Everything one tick observed.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub isolated: Vec<u32>,
    /// Monitored PIDs after reconciliation, ascending.
    pub monitored: Vec<u32>,
    /// One line per resolved task, in scan order.
    pub tasks: Vec<TaskReport>,
    pub violations: Vec<Violation>,
    pub removals: Vec<Removal>,
    /// False when the scheduler debug view could not be read.
    pub scan_available: bool,
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub trait ReportSink {
    fn render(&mut self, report: &TickReport) -> io::Result<()>;
}

/// Full-screen view for interactive use.
pub struct TerminalSink<W: Write> {
    out: W,
    clear: bool,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout(clear: bool) -> Self {
        Self::new(io::stdout(), clear)
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W, clear: bool) -> Self {
        Self { out, clear }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for TerminalSink<W> {
    fn render(&mut self, report: &TickReport) -> io::Result<()> {
        if self.clear {
            write!(self.out, "{}", CLEAR_SCREEN)?;
        }

        writeln!(
            self.out,
            "----   isolwatch (Ctrl+c to exit)   {}   ----",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(
            self.out,
            "----   monitoring isolated cpus = {}   ----",
            join(&report.isolated)
        )?;
        writeln!(
            self.out,
            "----   monitoring pids = {}   ----",
            join(&report.monitored)
        )?;
        writeln!(self.out)?;

        if !report.scan_available {
            writeln!(self.out, "scheduler debug view unavailable; no tasks scanned")?;
        }
        for task in &report.tasks {
            writeln!(self.out, "{}", task)?;
        }
        for removal in &report.removals {
            writeln!(self.out, "{}", removal)?;
        }

        self.out.flush()
    }
}

/// Sends the report through the logger, for non-interactive runs.
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn render(&mut self, report: &TickReport) -> io::Result<()> {
        if !report.scan_available {
            warn!("Scheduler debug view unavailable this tick");
        }
        info!(
            "isolated cpus=[{}] monitored pids=[{}]",
            join(&report.isolated),
            join(&report.monitored)
        );
        for task in &report.tasks {
            info!("{}", task);
        }
        for removal in &report.removals {
            info!("{}", removal);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Classification;
    use crate::monitored::RemovalReason;
    use crate::sources::RunState;

    fn report() -> TickReport {
        TickReport {
            isolated: vec![2, 3],
            monitored: vec![100],
            tasks: vec![TaskReport {
                comm: "spinner".to_string(),
                pid: 100,
                cpu: 3,
                state: RunState::Running,
                classification: Classification::Starving,
            }],
            removals: vec![Removal {
                pid: 55,
                reason: RemovalReason::StateChanged(RunState::Sleeping),
            }],
            scan_available: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_terminal_sink_output() {
        let mut sink = TerminalSink::new(Vec::new(), false);
        sink.render(&report()).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();

        assert!(out.contains("monitoring isolated cpus = 2,3"));
        assert!(out.contains("monitoring pids = 100"));
        assert!(out.contains("comm=spinner pid=100 cpu=3 state=R -- STARVING"));
        assert!(out.contains("pid=55 state=S -- removed from monitored"));
        assert!(!out.contains(CLEAR_SCREEN));
    }

    #[test]
    fn test_terminal_sink_clears_and_flags_missing_scan() {
        let mut sink = TerminalSink::new(Vec::new(), true);
        sink.render(&TickReport::default()).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();

        assert!(out.starts_with(CLEAR_SCREEN));
        assert!(out.contains("scheduler debug view unavailable"));
    }

    #[test]
    fn test_log_sink_never_fails() {
        assert!(LogSink.render(&report()).is_ok());
    }

    #[test]
    fn test_terminal_sink_lists_exits() {
        let mut report = report();
        report.removals.push(Removal {
            pid: 56,
            reason: RemovalReason::Exited,
        });
        let mut sink = TerminalSink::new(Vec::new(), false);
        sink.render(&report).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();

        let removed: Vec<&str> = out
            .lines()
            .filter(|l| l.ends_with("removed from monitored"))
            .collect();
        assert_eq!(
            removed,
            vec![
                "pid=55 state=S -- removed from monitored",
                "pid=56 exited -- removed from monitored"
            ]
        );
    }
}
