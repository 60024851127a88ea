//! Host power-off mechanisms.

use async_trait::async_trait;
use idlecatcher_core::{CatcherConfig, IdleError, Result, ShutdownMethod};
use nix::sys::reboot::{reboot, RebootMode};
use tokio::process::Command;
use tracing::{info, warn};

/// Something that can power off the host.
#[async_trait]
pub trait PowerOff: Send {
    /// Request power-off.
    ///
    /// On success the host is going down; the caller may still run for a
    /// short while.
    ///
    /// # Errors
    ///
    /// Returns [`IdleError::PowerOff`] if the request was refused.
    async fn power_off(&mut self) -> Result<()>;

    /// Short description used in log output.
    fn describe(&self) -> String;
}

#[async_trait]
impl<P: PowerOff + ?Sized> PowerOff for Box<P> {
    async fn power_off(&mut self) -> Result<()> {
        (**self).power_off().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Flush filesystems and call `reboot(2)` with `RB_POWER_OFF`.
///
/// Needs `CAP_SYS_BOOT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyscallPowerOff;

#[async_trait]
impl PowerOff for SyscallPowerOff {
    async fn power_off(&mut self) -> Result<()> {
        nix::unistd::sync();
        match reboot(RebootMode::RB_POWER_OFF) {
            Ok(never) => match never {},
            Err(errno) => Err(IdleError::power_off(self.describe(), errno.desc())),
        }
    }

    fn describe(&self) -> String {
        "reboot(2)".to_owned()
    }
}

/// Run an external command such as `systemctl poweroff`.
///
/// The command is awaited on the runtime, so a hung command does not keep
/// the monitor from reacting to signals.
#[derive(Debug, Clone)]
pub struct CommandPowerOff {
    program: String,
    args: Vec<String>,
}

impl CommandPowerOff {
    /// Create a power-off command.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl PowerOff for CommandPowerOff {
    async fn power_off(&mut self) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .await
            .map_err(|e| IdleError::power_off(self.describe(), e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(IdleError::power_off(self.describe(), status.to_string()))
        }
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Log the power-off instead of performing it.
#[derive(Debug, Clone)]
pub struct DryRunPowerOff {
    inner: String,
    requests: u32,
}

impl DryRunPowerOff {
    /// Wrap the description of the mechanism that would have been used.
    pub fn new(inner: impl Into<String>) -> Self {
        Self {
            inner: inner.into(),
            requests: 0,
        }
    }

    /// How many power-offs were requested.
    #[must_use]
    pub const fn requests(&self) -> u32 {
        self.requests
    }
}

#[async_trait]
impl PowerOff for DryRunPowerOff {
    async fn power_off(&mut self) -> Result<()> {
        self.requests += 1;
        warn!(method = %self.inner, "dry run: host would be powered off now");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("dry run ({})", self.inner)
    }
}

/// Build the power-off mechanism selected by the configuration.
#[must_use]
pub fn from_config(config: &CatcherConfig) -> Box<dyn PowerOff> {
    let method: Box<dyn PowerOff> = match &config.shutdown {
        ShutdownMethod::Syscall => Box::new(SyscallPowerOff),
        ShutdownMethod::Command { program, args } => {
            Box::new(CommandPowerOff::new(program.clone(), args.clone()))
        }
    };

    if config.dry_run {
        return Box::new(DryRunPowerOff::new(method.describe()));
    }

    info!(method = %method.describe(), "power-off mechanism selected");
    method
}
