//! Actions taken when a process is first found starving an isolated CPU.
//!
//! The monitor never changes scheduling state itself. The default hook only
//! logs what it would do; operators who want an actual class change plug in
//! a command such as `chrt --idle -p 0 {pid}`.

use std::{sync::Mutex, time::Duration};

use log::{info, warn};
use tokio::process::Command;
use tokio::task::JoinSet;

use crate::error::{MonitorError, Result};
use crate::settings::{RemediationPolicy, Settings};
use crate::sources::RunState;

/// A process that was just added to the monitored set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub pid: u32,
    pub comm: String,
    pub cpu: u32,
    pub state: RunState,
}

/// Invoked exactly once per transition into the monitored set.
pub trait Remediation {
    fn apply(&self, violation: &Violation) -> Result<()>;

    /// Hand over work started by `apply` that has not finished yet.
    ///
    /// The caller awaits it before shutting down the runtime.
    fn take_pending(&self) -> Option<JoinSet<()>> {
        None
    }
}

/// Records the intended class change and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnly;

impl Remediation for LogOnly {
    fn apply(&self, v: &Violation) -> Result<()> {
        info!(
            "comm={} pid={} cpu={} state={} -- would change scheduling class",
            v.comm, v.pid, v.cpu, v.state
        );
        Ok(())
    }
}

/// Runs an external command in the background for each violation.
///
/// Arguments may contain `{pid}`, `{comm}`, `{cpu}` and `{state}`.
#[derive(Debug)]
pub struct CommandHook {
    argv: Vec<String>,
    timeout: Duration,
    running: Mutex<JoinSet<()>>,
}

impl CommandHook {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self {
            argv,
            timeout,
            running: Mutex::new(JoinSet::new()),
        }
    }

    /// Split a template on whitespace.
    pub fn from_template(template: &str, timeout: Duration) -> Self {
        Self::new(template.split_whitespace().map(str::to_string).collect(), timeout)
    }

    pub fn render(&self, v: &Violation) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{pid}", &v.pid.to_string())
                    .replace("{comm}", &v.comm)
                    .replace("{cpu}", &v.cpu.to_string())
                    .replace("{state}", &v.state.to_string())
            })
            .collect()
    }
}

impl Remediation for CommandHook {
    fn apply(&self, v: &Violation) -> Result<()> {
        let failed = |reason: &str| MonitorError::RemediationFailed {
            pid: v.pid,
            reason: reason.to_string(),
        };

        let argv = self.render(v);
        let (program, args) = argv.split_first().ok_or_else(|| failed("empty command"))?;
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| failed("no async runtime"))?;

        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);
        let timeout = self.timeout;
        let pid = v.pid;
        let program = program.clone();

        let task = async move {
            match tokio::time::timeout(timeout, cmd.status()).await {
                Ok(Ok(status)) if status.success() => {
                    info!("Remediation {} for pid {} succeeded", program, pid);
                }
                Ok(Ok(status)) => {
                    warn!("Remediation {} for pid {} exited with {}", program, pid, status);
                }
                Ok(Err(e)) => warn!("Failed to run remediation {}: {}", program, e),
                Err(_) => warn!(
                    "Remediation {} for pid {} timed out after {:?}",
                    program, pid, timeout
                ),
            }
        };

        let mut running = self
            .running
            .lock()
            .map_err(|_| failed("task set poisoned"))?;
        // Reap finished commands so the set stays small on long runs.
        while running.try_join_next().is_some() {}
        running.spawn_on(task, &handle);

        Ok(())
    }

    fn take_pending(&self) -> Option<JoinSet<()>> {
        let mut running = self.running.lock().ok()?;
        if running.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut *running))
    }
}

/// Build the configured remediation hook.
pub fn from_settings(settings: &Settings) -> Box<dyn Remediation> {
    match settings.remediation_policy() {
        RemediationPolicy::Log => Box::new(LogOnly),
        RemediationPolicy::Command => match settings.remediation_command.as_deref() {
            Some(template) if !template.trim().is_empty() => Box::new(CommandHook::from_template(
                template,
                settings.remediation_timeout(),
            )),
            _ => {
                warn!("Remediation policy is 'command' but no command is set; logging only");
                Box::new(LogOnly)
            }
        },
    }
}
