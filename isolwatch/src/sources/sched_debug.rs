//! Runnable task extraction from the scheduler debug view.
//!
//! The kernel prints one line per task in each runqueue. The task currently
//! on the CPU is prefixed with `>R`, everything else with a space and its
//! state letter:
//!
//! ```text
//!  S        systemd     1      1203.443022    4420   120 ...
//! >R          bash   4242      9981.002134     812   120 ...
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use super::RunnableTask;

static RUNNING_TASK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*>R\s+(?<comm>\S+)\s+(?<pid>\d+)").unwrap());

/// One tick's copy of the scheduler debug view.
#[derive(Debug, Clone, Default)]
pub struct SchedDebugView {
    text: String,
}

impl SchedDebugView {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Lazily yields the running tasks in file order.
    pub fn runnable_tasks(&self) -> impl Iterator<Item = RunnableTask> + '_ {
        self.text.lines().filter_map(parse_runnable_line)
    }
}

/// Match a single debug view line against the running marker grammar.
pub fn parse_runnable_line(line: &str) -> Option<RunnableTask> {
    let caps = RUNNING_TASK.captures(line)?;
    let pid = caps["pid"].parse().ok()?;
    Some(RunnableTask {
        pid,
        comm: caps["comm"].to_string(),
    })
}
