//! # idlecatcher-core
//!
//! Shared building blocks for idlecatcher, a monitor that powers off a
//! Linux host after a sustained period of low CPU usage.
//!
//! ## Features
//!
//! - **Sampler trait** - Common interface for counter sources
//! - **Configuration management** - RON config file with CLI overrides and validation
//! - **Error handling** - One error type with context, shared by all crates
//!
//! ## Quick Start
//!
//! ```rust
//! use idlecatcher_core::{IdleError, Sampler};
//!
//! struct FixedSampler {
//!     value: u64,
//! }
//!
//! impl Sampler for FixedSampler {
//!     type Sample = u64;
//!     type Error = IdleError;
//!
//!     fn sample(&mut self) -> Result<u64, IdleError> {
//!         Ok(self.value)
//!     }
//!
//!     fn name(&self) -> &str {
//!         "fixed"
//!     }
//! }
//! ```

pub mod config;
pub mod error;

pub use config::{
    CatcherConfig, ShutdownMethod, DEFAULT_STAT_PATH, MAX_INTERVAL_SECS, SYSTEM_CONFIG_PATH,
};
pub use error::{IdleError, Result};

/// Trait for point-in-time counter sources.
///
/// A sampler returns either a trustworthy sample or an error; it never
/// substitutes a placeholder value for a failed read, so callers can skip
/// the interval instead of computing against bogus data.
pub trait Sampler {
    /// The value produced by one read.
    type Sample;

    /// Error type for sampling operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Take one sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    fn sample(&mut self) -> std::result::Result<Self::Sample, Self::Error>;

    /// Get the name of this sampler, used in log output.
    fn name(&self) -> &str;

    /// Check if the sampler's source is usable on this system.
    ///
    /// Default implementation returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is missing or unreadable.
    fn check_availability(&self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}
