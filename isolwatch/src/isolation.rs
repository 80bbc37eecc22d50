//! Isolated CPU discovery from the kernel command line.
//!
//! Both `isolcpus=` and `rcu_nocbs=` take a CPU list such as `0,2,4-6`.
//! `isolcpus=` may also carry flag words (`nohz`, `domain`, `managed_irq`)
//! in front of the list; those come out of the parser as skipped tokens.

use std::{fmt, ops::RangeInclusive, path::Path, time::Duration};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use procfs::{CpuInfo, FromRead};
use regex::Regex;

use crate::error::{MonitorError, Result};
use crate::sources::fs::read_bounded;

/// Upper bound of the kernel's `CONFIG_NR_CPUS`.
const MAX_CPUS: u32 = 8192;

static ISOLATION_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(?:isolcpus|rcu_nocbs)=(\S*)").unwrap());

/// CPUs reserved for isolated workloads. Built once at startup.
///
/// Keeps the order in which indices were listed and tolerates duplicates;
/// callers only ever ask for membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsolatedCpuSet {
    cpus: Vec<u32>,
}

impl IsolatedCpuSet {
    /// Parse every isolation parameter found in a kernel command line.
    pub fn from_cmdline(line: &str) -> Self {
        let mut cpus = Vec::new();
        for caps in ISOLATION_PARAM.captures_iter(line) {
            cpus.extend(parse_cpu_list(&caps[1]));
        }
        Self { cpus }
    }

    /// Read the boot parameter source and parse it.
    ///
    /// An unreadable source yields an empty set: monitoring then never fires.
    pub async fn load(path: &Path, timeout: Duration) -> Self {
        match read_bounded(path, timeout).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let set = Self::from_cmdline(text.lines().next().unwrap_or_default());
                if set.is_empty() {
                    info!("No isolcpus/rcu_nocbs parameter in {}", path.display());
                }
                set
            }
            Err(e) => {
                warn!(
                    "Failed to read boot parameters from {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn contains(&self, cpu: u32) -> bool {
        self.cpus.contains(&cpu)
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.cpus
    }

    /// Isolated indices that are not among `online`, in listing order.
    pub fn offline_members(&self, online: &[u32]) -> Vec<u32> {
        let mut missing: Vec<u32> = Vec::new();
        for cpu in &self.cpus {
            if !online.contains(cpu) && !missing.contains(cpu) {
                missing.push(*cpu);
            }
        }
        missing
    }
}

impl FromIterator<u32> for IsolatedCpuSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            cpus: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for IsolatedCpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .cpus
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

/// Expand a comma separated CPU list. Malformed tokens are skipped.
pub fn parse_cpu_list(list: &str) -> Vec<u32> {
    let mut cpus = Vec::new();
    for token in list.split(',') {
        match parse_cpu_token(token) {
            Ok(range) => cpus.extend(range),
            Err(e) => debug!("{}", e),
        }
    }
    cpus
}

fn parse_cpu_token(token: &str) -> Result<RangeInclusive<u32>> {
    let skipped = || MonitorError::ParseSkipped {
        token: token.to_string(),
    };

    match token.split_once('-') {
        Some((from, to)) => {
            let from = from.trim().parse::<u32>().map_err(|_| skipped())?;
            let to = to.trim().parse::<u32>().map_err(|_| skipped())?;
            if from >= MAX_CPUS || to >= MAX_CPUS {
                return Err(skipped());
            }
            Ok(from..=to)
        }
        None => {
            let cpu = token.trim().parse::<u32>().map_err(|_| skipped())?;
            if cpu >= MAX_CPUS {
                return Err(skipped());
            }
            Ok(cpu..=cpu)
        }
    }
}

/// CPU indices listed as `processor` entries in a cpuinfo dump.
pub fn online_cpus(cpuinfo: &[u8]) -> Option<Vec<u32>> {
    let info = CpuInfo::from_read(cpuinfo).ok()?;
    let cpus = (0..info.num_cores())
        .filter_map(|i| info.get_field(i, "processor"))
        .filter_map(|p| p.trim().parse().ok())
        .collect();
    Some(cpus)
}

/// Warn about isolated CPUs that the machine does not have online.
pub async fn check_online(isolated: &IsolatedCpuSet, cpuinfo_path: &Path, timeout: Duration) {
    if isolated.is_empty() {
        return;
    }

    let online = match read_bounded(cpuinfo_path, timeout).await {
        Ok(bytes) => online_cpus(&bytes),
        Err(e) => {
            debug!("Skipping online CPU check: {}", e);
            return;
        }
    };

    match online {
        Some(online) => {
            for cpu in isolated.offline_members(&online) {
                warn!("Isolated CPU {} is not online; it will never be flagged", cpu);
            }
        }
        None => debug!("Could not parse {}", cpuinfo_path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMDLINE: &str = "BOOT_IMAGE=/vmlinuz-6.1.0 root=/dev/sda1 ro quiet";

    #[test]
    fn test_parse_isolcpus_with_range() {
        let line = format!("{} isolcpus=0,2,4-6 nohz_full=0,2,4-6", CMDLINE);
        let set = IsolatedCpuSet::from_cmdline(&line);
        assert_eq!(set.as_slice(), &[0, 2, 4, 5, 6]);
    }

    #[test]
    fn test_parse_without_isolation_params() {
        let set = IsolatedCpuSet::from_cmdline(CMDLINE);
        assert!(set.is_empty());
    }

    #[test]
    fn test_parse_skips_malformed_token() {
        let set = IsolatedCpuSet::from_cmdline("ro isolcpus=1,x,3");
        assert_eq!(set.as_slice(), &[1, 3]);
    }

    #[test]
    fn test_parse_skips_isolcpus_flags() {
        let set = IsolatedCpuSet::from_cmdline("ro isolcpus=nohz,domain,2-3 quiet");
        assert_eq!(set.as_slice(), &[2, 3]);
    }

    #[test]
    fn test_parse_rcu_nocbs() {
        let set = IsolatedCpuSet::from_cmdline("ro rcu_nocbs=7");
        assert_eq!(set.as_slice(), &[7]);
        assert!(set.contains(7));
        assert!(!set.contains(6));
    }

    #[test]
    fn test_parse_merges_all_params() {
        let set = IsolatedCpuSet::from_cmdline("isolcpus=2 rcu_nocbs=5,2");
        assert_eq!(set.as_slice(), &[2, 5, 2]);
        assert_eq!(set.to_string(), "2,5,2");
    }

    #[test]
    fn test_parse_requires_parameter_boundary() {
        // `xisolcpus=` is a different parameter.
        let set = IsolatedCpuSet::from_cmdline("ro xisolcpus=1");
        assert!(set.is_empty());
    }

    #[test]
    fn test_reversed_range_is_empty() {
        assert!(parse_cpu_list("5-3").is_empty());
        assert_eq!(parse_cpu_list("3-,4"), vec![4]);
        assert_eq!(parse_cpu_list("1,,2,"), vec![1, 2]);
    }

    #[test]
    fn test_out_of_range_cpus_skipped() {
        let set = IsolatedCpuSet::from_cmdline("ro isolcpus=0-4294967295,1,8192,2-50000000,8191");
        assert_eq!(set.as_slice(), &[1, 8191]);
    }

    #[test]
    fn test_widest_range_is_bounded() {
        assert_eq!(parse_cpu_list("0-8191").len(), 8192);
    }

    #[test]
    fn test_parse_cpu_token_reports_skip() {
        let err = parse_cpu_token("abc").unwrap_err();
        assert!(matches!(err, MonitorError::ParseSkipped { token } if token == "abc"));
    }

    #[test]
    fn test_offline_members() {
        let set: IsolatedCpuSet = [2, 3, 9, 9].into_iter().collect();
        assert_eq!(set.offline_members(&[0, 1, 2, 3]), vec![9]);
    }

    #[test]
    fn test_online_cpus_from_cpuinfo() {
        let cpuinfo = b"processor\t: 0\nvendor_id\t: GenuineIntel\n\nprocessor\t: 1\nvendor_id\t: GenuineIntel\n\n";
        assert_eq!(online_cpus(cpuinfo), Some(vec![0, 1]));
    }

    #[tokio::test]
    async fn test_load_missing_source_is_empty() {
        let set = IsolatedCpuSet::load(
            Path::new("/nonexistent/isolwatch/cmdline"),
            Duration::from_millis(200),
        )
        .await;
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmdline");
        std::fs::write(&path, format!("{} isolcpus=3\n", CMDLINE)).unwrap();

        let set = IsolatedCpuSet::load(&path, Duration::from_millis(500)).await;
        assert_eq!(set.as_slice(), &[3]);
    }
}
