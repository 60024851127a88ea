//! Monitor configuration loaded from `config.ron` and command-line overrides.

use crate::error::{IdleError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// System-wide config file, checked before the per-user one.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/idlecatcher/config.ron";

/// Longest accepted polling period: one day.
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Default kernel counter file.
pub const DEFAULT_STAT_PATH: &str = "/proc/stat";

/// How the host is powered off once the idle streak is complete.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum ShutdownMethod {
    /// `sync` followed by `reboot(RB_POWER_OFF)`.
    #[default]
    Syscall,
    /// Run an external command, e.g. `systemctl poweroff`.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl ShutdownMethod {
    /// Build a command method from a whitespace separated command line.
    ///
    /// Returns `None` for an empty string.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_owned);
        let program = parts.next()?;
        Some(Self::Command {
            program,
            args: parts.collect(),
        })
    }
}

/// Configuration for one idlecatcher process.
///
/// Built once at startup and handed to the monitor by value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CatcherConfig {
    /// Usage fraction below which an interval counts as idle, in (0, 1)
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Polling period in seconds
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Consecutive idle intervals before the host is powered off
    #[serde(default = "default_max_idle")]
    pub max_idle: u32,
    /// Kernel counter file to sample
    #[serde(default = "default_stat_path")]
    pub stat_path: PathBuf,
    /// Power-off mechanism
    #[serde(default)]
    pub shutdown: ShutdownMethod,
    /// Log the power-off instead of performing it
    #[serde(default)]
    pub dry_run: bool,
}

fn default_threshold() -> f64 {
    0.1
}

fn default_interval() -> u64 {
    30
}

fn default_max_idle() -> u32 {
    15
}

fn default_stat_path() -> PathBuf {
    PathBuf::from(DEFAULT_STAT_PATH)
}

impl Default for CatcherConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            interval: default_interval(),
            max_idle: default_max_idle(),
            stat_path: default_stat_path(),
            shutdown: ShutdownMethod::default(),
            dry_run: false,
        }
    }
}

impl CatcherConfig {
    /// Load configuration from the standard config file locations.
    ///
    /// Searches for config in:
    /// 1. /etc/idlecatcher/config.ron
    /// 2. ~/.config/idlecatcher/config.ron
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from RON text.
    pub fn from_ron(content: &str) -> Result<Self> {
        ron::from_str(content).map_err(|e| IdleError::Parse {
            message: format!("Failed to parse config file: {}", e),
            source: None,
        })
    }

    /// Find the config file in standard locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let system_path = PathBuf::from(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            return Some(system_path);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_path = config_dir.join("idlecatcher").join("config.ron");
            if user_path.exists() {
                return Some(user_path);
            }
        }

        None
    }

    /// Get the default config file path for writing.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("idlecatcher").join("config.ron"))
    }

    /// Save an example configuration with documentation to a file.
    pub fn save_example_config_to_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let example = format!(
            r#"// idlecatcher configuration
//
// Copy to /etc/idlecatcher/config.ron or ~/.config/idlecatcher/config.ron.
// Command-line flags override any value set here.
(
    // Usage fraction (0.0 - 1.0, exclusive) below which an interval is idle
    threshold: {threshold},

    // Polling period in seconds
    interval: {interval},

    // Consecutive idle intervals before powering off
    max_idle: {max_idle},

    // Kernel counter file
    stat_path: "{stat_path}",

    // Power-off mechanism: Syscall, or an external command such as
    //   Command(program: "systemctl", args: ["poweroff"])
    shutdown: Syscall,

    // Log instead of powering off
    dry_run: false,
)
"#,
            threshold = default_threshold(),
            interval = default_interval(),
            max_idle = default_max_idle(),
            stat_path = DEFAULT_STAT_PATH,
        );

        std::fs::write(path, example)?;
        Ok(())
    }

    /// Set the idle threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the polling period in seconds.
    #[must_use]
    pub fn with_interval(mut self, seconds: u64) -> Self {
        self.interval = seconds;
        self
    }

    /// Set the number of idle intervals before power-off.
    #[must_use]
    pub fn with_max_idle(mut self, max_idle: u32) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the counter file path.
    #[must_use]
    pub fn with_stat_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.stat_path = path.into();
        self
    }

    /// Set the power-off mechanism.
    #[must_use]
    pub fn with_shutdown(mut self, method: ShutdownMethod) -> Self {
        self.shutdown = method;
        self
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Get the polling period as a Duration.
    #[must_use]
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`IdleError::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(IdleError::config(format!(
                "Threshold must be between 0 and 1 (exclusive), got {}",
                self.threshold
            )));
        }
        if !(1..=MAX_INTERVAL_SECS).contains(&self.interval) {
            return Err(IdleError::config(format!(
                "Interval must be between 1 and {} seconds, got {}",
                MAX_INTERVAL_SECS, self.interval
            )));
        }
        if self.max_idle == 0 {
            return Err(IdleError::config("max_idle must be at least 1"));
        }
        if let ShutdownMethod::Command { program, .. } = &self.shutdown {
            if program.trim().is_empty() {
                return Err(IdleError::config("Shutdown command must not be empty"));
            }
        }
        Ok(())
    }
}
