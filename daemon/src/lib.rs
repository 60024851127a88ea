//! idlecatcher: power off a Linux host after sustained low CPU usage.
//!
//! Every interval the monitor reads the aggregate CPU counters, computes
//! the busy fraction since the previous read and feeds it to an
//! [`IdleTracker`]. Once usage has stayed below the threshold for
//! `max_idle` consecutive intervals the configured [`PowerOff`] mechanism
//! is invoked.
//!
//! Per-interval reports are written with [`write_report`] to stdout, as
//! status lines or JSON; log output belongs on stderr.
//!
//! # Examples
//!
//! ```rust,no_run
//! use idlecatcher::{monitor, shutdown, Monitor};
//! use idlecatcher_core::CatcherConfig;
//! use idlecatcher_cpu::ProcStatSampler;
//!
//! # async fn example() -> idlecatcher_core::Result<()> {
//! let config = CatcherConfig::default().with_dry_run(true);
//! let sampler = ProcStatSampler::with_path(&config.stat_path);
//! let power = shutdown::from_config(&config);
//!
//! let monitor = Monitor::new(&config, sampler, power);
//! monitor::run(monitor, config.interval_duration(), false).await
//! # }
//! ```

pub mod monitor;
pub mod shutdown;
pub mod tracker;

pub use monitor::{run, run_until, write_report, IntervalReport, Monitor, Outcome};
pub use shutdown::{CommandPowerOff, DryRunPowerOff, PowerOff, SyscallPowerOff};
pub use tracker::{IdleStatus, IdleTracker};
