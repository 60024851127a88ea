//! The polling loop: sample, compute usage, track the idle streak and
//! power off when it completes.

use crate::shutdown::PowerOff;
use crate::tracker::{IdleStatus, IdleTracker};
use idlecatcher_core::{CatcherConfig, IdleError, Result, Sampler, MAX_INTERVAL_SECS};
use idlecatcher_cpu::{compute_usage, CpuSample};
use serde::Serialize;
use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// What happened during one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// First usable sample; nothing to compare against yet.
    Baseline,
    /// The sampler failed; state left untouched.
    Unavailable,
    /// No ticks elapsed or the counters went backwards; state left untouched.
    Skipped,
    /// Usage at or above the threshold.
    Active,
    /// Usage below the threshold, streak not complete.
    Idle,
    /// Streak complete and the power-off request was accepted.
    PowerOffRequested,
    /// Streak complete but the power-off request failed.
    PowerOffFailed,
}

/// Per-interval report, produced after the state transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalReport {
    /// 1-based interval number
    pub interval: u64,
    pub outcome: Outcome,
    /// Busy fraction, when one could be computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<f64>,
    /// Consecutive idle intervals after this one
    pub idle_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Idle monitor over a CPU sampler and a power-off mechanism.
pub struct Monitor<S, P> {
    sampler: S,
    power: P,
    tracker: IdleTracker,
    prev: Option<CpuSample>,
    intervals: u64,
}

impl<S, P> Monitor<S, P>
where
    S: Sampler<Sample = CpuSample, Error = IdleError>,
    P: PowerOff,
{
    /// Create a monitor with an empty idle streak and no baseline sample.
    pub fn new(config: &CatcherConfig, sampler: S, power: P) -> Self {
        Self {
            sampler,
            power,
            tracker: IdleTracker::new(config.threshold, config.max_idle),
            prev: None,
            intervals: 0,
        }
    }

    /// Take the initial sample before the first interval starts.
    ///
    /// Returns `false` if it was unavailable; the first successful tick then
    /// becomes the baseline instead.
    pub fn prime(&mut self) -> bool {
        match self.read_sample() {
            Ok(sample) => {
                debug!(idle = sample.idle, total = sample.total, "initial sample");
                self.prev = Some(sample);
                true
            }
            Err(e) => {
                warn!(sampler = self.sampler.name(), error = %e, "initial sample unavailable");
                false
            }
        }
    }

    /// Run one interval.
    pub async fn tick(&mut self) -> IntervalReport {
        self.intervals += 1;

        let curr = match self.read_sample() {
            Ok(sample) => sample,
            Err(e) => {
                if e.is_transient() {
                    warn!(sampler = self.sampler.name(), error = %e, "sample unavailable, skipping interval");
                } else {
                    error!(sampler = self.sampler.name(), error = %e, "sample unavailable, skipping interval");
                }
                return self.report(Outcome::Unavailable, None, Some(e.to_string()));
            }
        };

        let Some(prev) = self.prev.replace(curr) else {
            debug!("baseline sample taken");
            return self.report(Outcome::Baseline, None, None);
        };

        let Some(usage) = compute_usage(&prev, &curr) else {
            debug!(?prev, ?curr, "no elapsed ticks or counters went backwards, skipping interval");
            return self.report(Outcome::Skipped, None, None);
        };

        match self.tracker.observe(usage) {
            IdleStatus::Active => self.report(Outcome::Active, Some(usage), None),
            IdleStatus::Idle(_) => self.report(Outcome::Idle, Some(usage), None),
            IdleStatus::Expired(count) => self.power_off(usage, count).await,
        }
    }

    /// The idle streak.
    pub fn tracker(&self) -> &IdleTracker {
        &self.tracker
    }

    /// The counter source.
    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// The power-off mechanism.
    pub fn power(&self) -> &P {
        &self.power
    }

    fn read_sample(&mut self) -> Result<CpuSample> {
        let sample = self.sampler.sample()?;
        if sample.is_zero() {
            return Err(IdleError::invalid_data("Sampler returned all-zero counters"));
        }
        Ok(sample)
    }

    async fn power_off(&mut self, usage: f64, count: u32) -> IntervalReport {
        info!(count, method = %self.power.describe(), "idle limit reached, powering off");
        match self.power.power_off().await {
            Ok(()) => {
                let report = self.report(Outcome::PowerOffRequested, Some(usage), None);
                self.tracker.reset();
                report
            }
            Err(e) => {
                error!(error = %e, "power-off failed, will retry on the next idle interval");
                self.report(Outcome::PowerOffFailed, Some(usage), Some(e.to_string()))
            }
        }
    }

    fn report(&self, outcome: Outcome, usage: Option<f64>, error: Option<String>) -> IntervalReport {
        IntervalReport {
            interval: self.intervals,
            outcome,
            usage,
            idle_count: self.tracker.count(),
            error,
        }
    }
}

/// Write a report as status lines, or as one JSON object per line.
///
/// Only reports go to `out`; diagnostics go through `tracing`.
///
/// # Errors
///
/// Returns an error if the report cannot be serialized or written.
pub fn write_report<W: Write>(out: &mut W, report: &IntervalReport, json: bool) -> io::Result<()> {
    if json {
        let line = serde_json::to_string(report).map_err(io::Error::from)?;
        writeln!(out, "{}", line)?;
        return out.flush();
    }

    if let Some(usage) = report.usage {
        writeln!(out, "CPU usage: {}", usage)?;
    }
    if matches!(
        report.outcome,
        Outcome::Idle | Outcome::PowerOffRequested | Outcome::PowerOffFailed
    ) {
        writeln!(out, "CPU usage below threshold [count: {}]", report.idle_count)?;
    }
    out.flush()
}

/// Drive the monitor every `period`, writing reports to `out`, until
/// `shutdown` completes.
///
/// The initial sample is taken immediately and the first interval ends one
/// `period` later. A tick that runs late pushes the following ones back
/// rather than firing them in a burst. `shutdown` is honoured even while a
/// power-off request is still pending.
///
/// # Errors
///
/// Returns [`IdleError::Config`] if `period` is zero or longer than
/// [`MAX_INTERVAL_SECS`] seconds.
pub async fn run_until<S, P, W, F>(
    monitor: &mut Monitor<S, P>,
    period: Duration,
    json: bool,
    out: &mut W,
    shutdown: F,
) -> Result<()>
where
    S: Sampler<Sample = CpuSample, Error = IdleError>,
    P: PowerOff,
    W: Write,
    F: Future<Output = ()>,
{
    if period.is_zero() || period > Duration::from_secs(MAX_INTERVAL_SECS) {
        return Err(IdleError::config(format!(
            "Polling period must be between 1 and {} seconds, got {:?}",
            MAX_INTERVAL_SECS, period
        )));
    }

    monitor.prime();

    let start = Instant::now()
        .checked_add(period)
        .ok_or_else(|| IdleError::config(format!("Polling period {:?} is out of range", period)))?;
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let polling = async {
        loop {
            ticker.tick().await;
            let report = monitor.tick().await;
            if let Err(e) = write_report(out, &report, json) {
                warn!(error = %e, "failed to write interval report");
            }
        }
    };

    tokio::select! {
        _ = polling => {}
        () = shutdown => {}
    }

    Ok(())
}

/// Drive the monitor on stdout until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed or the
/// period is out of range.
pub async fn run<S, P>(mut monitor: Monitor<S, P>, period: Duration, json: bool) -> Result<()>
where
    S: Sampler<Sample = CpuSample, Error = IdleError>,
    P: PowerOff,
{
    let mut terminate = signal(SignalKind::terminate())?;

    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("interrupted, exiting"),
            _ = terminate.recv() => info!("terminated, exiting"),
        }
    };

    run_until(&mut monitor, period, json, &mut io::stdout(), shutdown).await
}
