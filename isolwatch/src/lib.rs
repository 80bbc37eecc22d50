pub mod detector;
pub mod error;
pub mod isolation;
pub mod monitor;
pub mod monitored;
pub mod remediation;
pub mod report;
pub mod settings;
pub mod sources;
pub mod telemetry;

use anyhow::Result;
use log::{info, warn};
use tokio::signal;

use crate::isolation::IsolatedCpuSet;
use crate::monitor::Monitor;
use crate::report::{LogSink, ReportSink, TerminalSink};
use crate::settings::Settings;
use crate::sources::ProcFs;

/// How each tick is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Terminal { clear: bool },
    Log,
}

pub struct IsolWatchEngine {
    pub settings: Settings,
    output: Output,
    once: bool,
}

impl IsolWatchEngine {
    pub fn new(settings: Settings) -> Self {
        let output = Output::Terminal {
            clear: settings.clear_screen(),
        };
        Self {
            settings,
            output,
            once: false,
        }
    }

    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    /// Stop after the first tick.
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    pub async fn run(self) -> Result<()> {
        let timeout = self.settings.read_timeout();

        let isolated = IsolatedCpuSet::load(&self.settings.cmdline_path(), timeout).await;
        isolation::check_online(&isolated, &self.settings.cpuinfo_path(), timeout).await;
        if isolated.is_empty() {
            warn!("No isolated CPUs configured; nothing will be flagged");
        } else {
            info!("Monitoring isolated cpus = {}", isolated);
        }

        let table = ProcFs::new(
            self.settings.proc_root(),
            self.settings.sched_debug_paths(),
            timeout,
        );
        let remediation = remediation::from_settings(&self.settings);
        let mut monitor = Monitor::new(table, isolated, remediation);

        let mut sink: Box<dyn ReportSink> = match self.output {
            Output::Terminal { clear } => Box::new(TerminalSink::stdout(clear)),
            Output::Log => Box::new(LogSink),
        };

        let interval = self.settings.interval();
        info!("Monitoring active (interval={:?}). Press Ctrl-C to exit.", interval);

        let outcome = loop {
            let report = monitor.tick().await;
            telemetry::record_tick(&report);
            if let Err(e) = sink.render(&report) {
                warn!("Failed to render report: {}", e);
            }

            if self.once {
                break Ok(());
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                res = signal::ctrl_c() => break res,
            }
        };

        monitor.finish().await;
        info!("Exiting...");
        Ok(outcome?)
    }
}
