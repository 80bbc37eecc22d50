use procfs::{FromRead, process::Stat};

use super::{CpuSnapshot, RunState};
use crate::error::{MonitorError, Result};

/// Extract the last-executed CPU and run state from a `/proc/<pid>/stat` record.
///
/// The comm field may contain spaces and parentheses, so the record goes
/// through procfs' parser rather than a plain whitespace split. Any layout
/// problem, including a kernel that omits the processor field, is reported
/// as `ProcessNotFound`.
pub fn parse_stat(pid: u32, record: &[u8]) -> Result<(CpuSnapshot, RunState)> {
    // procfs slices around the comm parens unchecked: require a pid before
    // `(`, a `)` after it and at least one field after the `)`.
    let record = record.trim_ascii();
    let start = record.iter().position(|&b| b == b'(');
    let end = record.iter().rposition(|&b| b == b')');
    let well_formed = match (start, end) {
        (Some(start), Some(end)) => start >= 2 && end > start && record.len() > end + 2,
        _ => false,
    };
    if !well_formed {
        return Err(MonitorError::ProcessNotFound { pid });
    }

    let stat = Stat::from_read(record).map_err(|_| MonitorError::ProcessNotFound { pid })?;

    let cpu = stat
        .processor
        .and_then(|cpu| u32::try_from(cpu).ok())
        .ok_or(MonitorError::ProcessNotFound { pid })?;

    Ok((CpuSnapshot { pid, cpu }, RunState::from_code(stat.state)))
}

#[cfg(test)]
pub(crate) fn stat_line(pid: u32, comm: &str, state: char, cpu: u32) -> String {
    format!(
        "{pid} ({comm}) {state} 1 {pid} {pid} 0 -1 4194560 120 0 0 0 500 3 0 0 20 0 1 0 \
         123456 12345678 300 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 {cpu} \
         0 0 0 0 0 0 0 0 0 0 0 0 0\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stat_running() {
        let line = stat_line(4242, "spinner", 'R', 3);
        let (snap, state) = parse_stat(4242, line.as_bytes()).unwrap();
        assert_eq!(snap, CpuSnapshot { pid: 4242, cpu: 3 });
        assert_eq!(state, RunState::Running);
    }

    #[test]
    fn test_parse_stat_comm_with_spaces_and_parens() {
        let line = stat_line(17, "tmux: (server) x", 'S', 11);
        let (snap, state) = parse_stat(17, line.as_bytes()).unwrap();
        assert_eq!(snap.cpu, 11);
        assert_eq!(state, RunState::Sleeping);
    }

    #[test]
    fn test_parse_stat_truncated_record() {
        let err = parse_stat(9, b"9 (short) R 1 9").unwrap_err();
        assert!(err.is_process_not_found());
    }

    #[test]
    fn test_parse_stat_cut_after_comm() {
        assert!(parse_stat(9, b"9 (short)").is_err());
        assert!(parse_stat(9, b"9 (short) ").is_err());
        assert!(parse_stat(9, b"9 (x)\n\n").is_err());
    }

    #[test]
    fn test_parse_stat_misplaced_parens() {
        assert!(parse_stat(9, b"(x) R 1").is_err());
        assert!(parse_stat(9, b"9 )x( R 1").is_err());
        assert!(parse_stat(9, b"9 (x) R").is_err());
        assert!(parse_stat(9, b"9 (x)) R 1").is_err());
    }

    #[test]
    fn test_parse_stat_trailing_whitespace() {
        let line = format!("{}\n\n", stat_line(12, "worker", 'R', 5).trim_end());
        let (snap, _) = parse_stat(12, line.as_bytes()).unwrap();
        assert_eq!(snap.cpu, 5);
    }

    #[test]
    fn test_parse_stat_garbage() {
        let err = parse_stat(9, b"not a stat record").unwrap_err();
        assert!(matches!(err, MonitorError::ProcessNotFound { pid: 9 }));
    }
}
