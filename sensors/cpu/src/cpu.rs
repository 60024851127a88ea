//! Aggregate CPU sampler for idlecatcher.
//!
//! Reads the `cpu` summary line from `/proc/stat` and turns consecutive
//! readings into a busy fraction.

use idlecatcher_core::{IdleError, Result, Sampler, DEFAULT_STAT_PATH};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Column of the idle counter, counted from the first field after the tag.
const IDLE_COLUMN: usize = 3;

/// Cumulative CPU ticks since boot, summed across all logical CPUs.
///
/// All values are in clock ticks (USER_HZ).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuSample {
    /// Ticks spent in the idle state
    pub idle: u64,
    /// Ticks spent in every state, idle included
    pub total: u64,
}

impl CpuSample {
    /// Create a sample from raw tick counts.
    #[must_use]
    pub const fn new(idle: u64, total: u64) -> Self {
        Self { idle, total }
    }

    /// Whether both counters are zero, which no running kernel reports.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.idle == 0 && self.total == 0
    }

    /// Parse the aggregate `cpu` line of `/proc/stat`.
    ///
    /// Columns are user, nice, system, idle, iowait, irq, softirq, followed
    /// by whatever the kernel appends (steal, guest, ...). Every column adds
    /// to the total; only column 3 is idle. A column other than idle that
    /// fails to parse is logged and left out of the total.
    ///
    /// # Errors
    ///
    /// Returns [`IdleError::Parse`] if the line is not the aggregate line or
    /// the idle column is not a number, and [`IdleError::InvalidData`] if
    /// the line has fewer than four columns.
    pub fn parse_from_proc_stat_line(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("cpu") {
            return Err(IdleError::parse("Line is not the aggregate cpu line"));
        }

        let fields: Vec<&str> = fields.collect();
        if fields.len() <= IDLE_COLUMN {
            return Err(IdleError::invalid_data(format!(
                "Insufficient CPU statistics: expected at least {}, got {} in {:?}",
                IDLE_COLUMN + 1,
                fields.len(),
                line
            )));
        }

        let mut idle = 0;
        let mut total: u64 = 0;
        for (column, raw) in fields.iter().enumerate() {
            match raw.parse::<u64>() {
                Ok(value) => {
                    total = total.saturating_add(value);
                    if column == IDLE_COLUMN {
                        idle = value;
                    }
                }
                Err(e) if column == IDLE_COLUMN => {
                    return Err(IdleError::parse_with_source(
                        format!("Failed to parse idle ticks {:?}", raw),
                        e,
                    ));
                }
                Err(e) => {
                    warn!(column, value = %raw, error = %e, "skipping unparseable cpu field");
                }
            }
        }

        Ok(Self { idle, total })
    }

    /// Find and parse the aggregate line in the full contents of `/proc/stat`.
    ///
    /// # Errors
    ///
    /// Returns [`IdleError::InvalidData`] if there is no `cpu` line, or any
    /// error from [`CpuSample::parse_from_proc_stat_line`].
    pub fn parse_proc_stat(content: &str) -> Result<Self> {
        let line = content
            .lines()
            .find(|line| line.split_whitespace().next() == Some("cpu"))
            .ok_or_else(|| IdleError::invalid_data("No aggregate cpu line in stat file"))?;

        Self::parse_from_proc_stat_line(line)
    }
}

/// Fraction of elapsed ticks spent busy between two samples, in `[0, 1]`.
///
/// Returns `None` when no ticks elapsed or when either counter went
/// backwards; the caller should skip the interval in both cases.
#[must_use]
pub fn compute_usage(prev: &CpuSample, curr: &CpuSample) -> Option<f64> {
    let total_delta = curr.total.checked_sub(prev.total)?;
    let idle_delta = curr.idle.checked_sub(prev.idle)?;
    if total_delta == 0 {
        return None;
    }

    let busy_delta = total_delta.saturating_sub(idle_delta);
    Some((busy_delta as f64 / total_delta as f64).clamp(0.0, 1.0))
}

/// Sampler over the kernel's `/proc/stat` (or a file in the same format).
#[derive(Debug, Clone)]
pub struct ProcStatSampler {
    name: String,
    path: PathBuf,
}

impl Default for ProcStatSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcStatSampler {
    /// Create a sampler reading `/proc/stat`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(DEFAULT_STAT_PATH)
    }

    /// Create a sampler reading a specific path (useful for testing).
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            name: "cpu".to_owned(),
            path: path.into(),
        }
    }

    /// The file this sampler reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_sample(&self) -> Result<CpuSample> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                IdleError::permission_denied(self.path.display().to_string())
            }
            _ => IdleError::Io(e),
        })?;

        CpuSample::parse_proc_stat(&content)
    }
}

impl Sampler for ProcStatSampler {
    type Sample = CpuSample;
    type Error = IdleError;

    fn sample(&mut self) -> Result<CpuSample> {
        self.read_sample()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn check_availability(&self) -> Result<()> {
        if !self.path.exists() {
            return Err(IdleError::unavailable(format!(
                "{} does not exist (not a Linux system?)",
                self.path.display()
            )));
        }

        let sample = self.read_sample()?;
        if sample.is_zero() {
            return Err(IdleError::invalid_data(format!(
                "{} reports zero CPU ticks",
                self.path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aggregate_line() {
        let sample = CpuSample::parse_from_proc_stat_line("cpu 100 0 100 9700 50 0 50").unwrap();
        assert_eq!(sample.idle, 9700);
        assert_eq!(sample.total, 10000);
    }

    #[test]
    fn test_parse_includes_trailing_columns_in_total() {
        let line = "cpu  1234 5678 9012 3456 7890 1234 5678 9012 0 0";
        let sample = CpuSample::parse_from_proc_stat_line(line).unwrap();
        assert_eq!(sample.idle, 3456);
        assert_eq!(sample.total, 1234 + 5678 + 9012 + 3456 + 7890 + 1234 + 5678 + 9012);
    }

    #[test]
    fn test_parse_minimal_line() {
        let sample = CpuSample::parse_from_proc_stat_line("cpu  100 200 300 400").unwrap();
        assert_eq!(sample, CpuSample::new(400, 1000));
    }

    #[test]
    fn test_parse_rejects_per_core_lines() {
        assert!(CpuSample::parse_from_proc_stat_line("cpu0 1 2 3 4").is_err());
        assert!(CpuSample::parse_from_proc_stat_line("cpu12 1 2 3 4").is_err());
        assert!(CpuSample::parse_from_proc_stat_line("intr 1 2 3 4").is_err());
        assert!(CpuSample::parse_from_proc_stat_line("").is_err());
    }

    #[test]
    fn test_parse_too_few_columns() {
        let err = CpuSample::parse_from_proc_stat_line("cpu 1 2 3").unwrap_err();
        assert!(matches!(err, IdleError::InvalidData(_)));
    }

    #[test]
    fn test_parse_skips_bad_non_idle_field() {
        let sample = CpuSample::parse_from_proc_stat_line("cpu 100 x 100 9700 50 0 50").unwrap();
        assert_eq!(sample.idle, 9700);
        assert_eq!(sample.total, 10000);
    }

    #[test]
    fn test_parse_bad_idle_field_is_error() {
        let err = CpuSample::parse_from_proc_stat_line("cpu 100 0 100 -5 50 0 50").unwrap_err();
        assert!(matches!(err, IdleError::Parse { .. }));
    }

    #[test]
    fn test_parse_proc_stat_skips_to_aggregate_line() {
        let content = "cpu0 50 0 50 4850 25 0 25\ncpu 100 0 100 9700 50 0 50\nintr 0\n";
        let sample = CpuSample::parse_proc_stat(content).unwrap();
        assert_eq!(sample, CpuSample::new(9700, 10000));
    }

    #[test]
    fn test_parse_proc_stat_missing_aggregate_line() {
        let content = "cpu0 1 2 3 4\ncpu1 1 2 3 4\nctxt 100\n";
        let err = CpuSample::parse_proc_stat(content).unwrap_err();
        assert!(matches!(err, IdleError::InvalidData(_)));
        assert!(CpuSample::parse_proc_stat("").is_err());
    }

    #[test]
    fn test_usage_busy_interval() {
        let prev = CpuSample::parse_from_proc_stat_line("cpu 100 0 100 9700 50 0 50").unwrap();
        let curr = CpuSample::parse_from_proc_stat_line("cpu 110 0 110 9780 50 0 50").unwrap();
        let usage = compute_usage(&prev, &curr).unwrap();
        assert!((usage - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_usage_fully_idle_interval() {
        let prev = CpuSample::new(9700, 10000);
        let curr = CpuSample::new(9800, 10100);
        assert_eq!(compute_usage(&prev, &curr), Some(0.0));
    }

    #[test]
    fn test_usage_fully_busy_interval() {
        let prev = CpuSample::new(9700, 10000);
        let curr = CpuSample::new(9700, 10100);
        assert_eq!(compute_usage(&prev, &curr), Some(1.0));
    }

    #[test]
    fn test_usage_no_elapsed_ticks() {
        let sample = CpuSample::new(9700, 10000);
        assert_eq!(compute_usage(&sample, &sample), None);
    }

    #[test]
    fn test_usage_counter_regression() {
        let prev = CpuSample::new(9700, 10000);
        assert_eq!(compute_usage(&prev, &CpuSample::new(0, 0)), None);
        assert_eq!(compute_usage(&prev, &CpuSample::new(9600, 10100)), None);
    }

    #[test]
    fn test_usage_bounded_and_repeatable() {
        let prev = CpuSample::new(500, 1000);
        for (idle_step, total_step) in [(0, 1), (1, 1), (3, 7), (50, 100), (999, 1000)] {
            let curr = CpuSample::new(prev.idle + idle_step, prev.total + total_step);
            let usage = compute_usage(&prev, &curr).unwrap();
            assert!((0.0..=1.0).contains(&usage));
            assert_eq!(compute_usage(&prev, &curr), Some(usage));
        }
    }

    #[test]
    fn test_zero_sample() {
        assert!(CpuSample::new(0, 0).is_zero());
        assert!(!CpuSample::new(0, 1).is_zero());
    }

    #[test]
    fn test_sampler_missing_file() {
        let mut sampler = ProcStatSampler::with_path("/nonexistent/idlecatcher/stat");
        assert_eq!(sampler.name(), "cpu");
        assert!(matches!(sampler.sample(), Err(IdleError::Io(_))));
        assert!(matches!(
            sampler.check_availability(),
            Err(IdleError::Unavailable(_))
        ));
    }
}
