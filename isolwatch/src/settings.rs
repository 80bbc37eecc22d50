use std::{path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::sources::fs::{DEFAULT_PROC_ROOT, DEFAULT_SCHED_DEBUG_PATHS};

const DEFAULT_INTERVAL_SECONDS: u64 = 3;
const DEFAULT_READ_TIMEOUT_MS: u64 = 500;
const DEFAULT_REMEDIATION_TIMEOUT_MS: u64 = 2000;
const DEFAULT_CMDLINE_PATH: &str = "/proc/cmdline";
const DEFAULT_CPUINFO_PATH: &str = "/proc/cpuinfo";

/// What to do when a process is first found on an isolated CPU.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemediationPolicy {
    /// Log the intended change only
    #[default]
    Log,
    /// Run `remediation_command`
    Command,
}

/// Runtime settings, read from `ISOLWATCH_*` environment variables.
#[derive(Debug, Deserialize, Clone, Default)]
#[allow(unused)]
pub struct Settings {
    pub cmdline_path: Option<PathBuf>,
    pub cpuinfo_path: Option<PathBuf>,
    pub proc_root: Option<PathBuf>,
    pub sched_debug_paths: Option<Vec<PathBuf>>,
    pub interval_secs: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub clear_screen: Option<bool>,
    pub remediation: Option<RemediationPolicy>,
    pub remediation_command: Option<String>,
    pub remediation_timeout_ms: Option<u64>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let s = Config::builder()
            .add_source(
                Environment::with_prefix("ISOLWATCH")
                    .prefix_separator("_")
                    .list_separator(",")
                    .with_list_parse_key("sched_debug_paths")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = s.try_deserialize()?;
        log::debug!("Parsed settings: {:?}", settings);
        Ok(settings)
    }

    pub fn cmdline_path(&self) -> PathBuf {
        self.cmdline_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CMDLINE_PATH))
    }

    pub fn cpuinfo_path(&self) -> PathBuf {
        self.cpuinfo_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CPUINFO_PATH))
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn sched_debug_paths(&self) -> Vec<PathBuf> {
        match &self.sched_debug_paths {
            Some(paths) if !paths.is_empty() => paths.clone(),
            _ => DEFAULT_SCHED_DEBUG_PATHS.iter().map(PathBuf::from).collect(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECONDS))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS))
    }

    pub fn clear_screen(&self) -> bool {
        self.clear_screen.unwrap_or(true)
    }

    pub fn remediation_policy(&self) -> RemediationPolicy {
        self.remediation.unwrap_or_default()
    }

    pub fn remediation_timeout(&self) -> Duration {
        Duration::from_millis(
            self.remediation_timeout_ms
                .unwrap_or(DEFAULT_REMEDIATION_TIMEOUT_MS),
        )
    }
}
