//! Aggregate CPU sampling for idlecatcher.
//!
//! This crate reads the aggregate `cpu` line of `/proc/stat` and derives
//! the fraction of elapsed ticks the machine spent busy between two reads.
//!
//! # Examples
//!
//! ```rust
//! use idlecatcher_cpu::{compute_usage, CpuSample};
//!
//! let prev = CpuSample::parse_from_proc_stat_line("cpu 100 0 100 9700 50 0 50")?;
//! let curr = CpuSample::parse_from_proc_stat_line("cpu 110 0 110 9780 50 0 50")?;
//!
//! let usage = compute_usage(&prev, &curr).unwrap();
//! assert!((usage - 0.2).abs() < 1e-9);
//! # Ok::<(), idlecatcher_core::IdleError>(())
//! ```

pub mod cpu;

pub use cpu::{compute_usage, CpuSample, ProcStatSampler};
