//! idlecatcher: power off the host after a sustained idle period.
//!
//! Reads `/proc/stat` every interval and powers the machine off once CPU
//! usage has stayed below the threshold for enough consecutive intervals.

use anyhow::{Context, Result};
use clap::Parser;
use idlecatcher::{monitor, shutdown, Monitor};
use idlecatcher_core::{CatcherConfig, Sampler, ShutdownMethod, MAX_INTERVAL_SECS};
use idlecatcher_cpu::ProcStatSampler;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments. Unset values fall back to the config file.
#[derive(Parser)]
#[command(name = "idlecatcher")]
#[command(about = "Power off the host after a sustained period of low CPU usage")]
#[command(version)]
#[command(author)]
struct Args {
    /// Config file (default: /etc/idlecatcher/config.ron, then ~/.config/idlecatcher/config.ron)
    #[arg(short = 'C', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Usage fraction below which an interval counts as idle (0-1, exclusive)
    #[arg(short, long, value_parser = validate_threshold)]
    threshold: Option<f64>,

    /// Polling interval in seconds (at most one day)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_SECS))]
    interval: Option<u64>,

    /// Consecutive idle intervals before powering off
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    max_idle: Option<u32>,

    /// Counter file to read instead of /proc/stat
    #[arg(long, value_name = "PATH")]
    stat_path: Option<PathBuf>,

    /// Power off by running this command (e.g. "systemctl poweroff") instead of reboot(2)
    #[arg(long, value_name = "COMMAND")]
    shutdown_command: Option<String>,

    /// Log the power-off instead of performing it
    #[arg(long)]
    dry_run: bool,

    /// Print one JSON report per interval on stdout
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Verify the counter file is readable and parseable, then exit
    #[arg(long)]
    check: bool,

    /// Generate example config file and exit
    #[arg(long)]
    generate_config: bool,
}

/// Validate that the threshold is a fraction strictly between 0 and 1.
fn validate_threshold(s: &str) -> Result<f64, String> {
    let threshold = s
        .parse::<f64>()
        .map_err(|_| "Threshold must be a number between 0 and 1".to_owned())?;

    if !(threshold > 0.0 && threshold < 1.0) {
        return Err("Threshold must be between 0 and 1 (exclusive)".to_owned());
    }

    Ok(threshold)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

/// Config file values with command-line overrides applied.
fn resolve_config(args: &Args) -> Result<CatcherConfig> {
    let mut config = match &args.config {
        Some(path) => CatcherConfig::load_from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CatcherConfig::load().context("failed to load config")?,
    };

    if let Some(threshold) = args.threshold {
        config = config.with_threshold(threshold);
    }
    if let Some(interval) = args.interval {
        config = config.with_interval(interval);
    }
    if let Some(max_idle) = args.max_idle {
        config = config.with_max_idle(max_idle);
    }
    if let Some(path) = &args.stat_path {
        config = config.with_stat_path(path.clone());
    }
    if let Some(line) = &args.shutdown_command {
        let method = ShutdownMethod::from_command_line(line)
            .context("--shutdown-command must not be empty")?;
        config = config.with_shutdown(method);
    }
    if args.dry_run {
        config = config.with_dry_run(true);
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.generate_config {
        let path = args
            .config
            .clone()
            .or_else(CatcherConfig::default_config_path)
            .context("could not determine config directory")?;
        CatcherConfig::save_example_config_to_file(&path)?;
        println!("Generated example config at: {}", path.display());
        return Ok(());
    }

    let config = resolve_config(&args)?;
    let sampler = ProcStatSampler::with_path(&config.stat_path);

    if args.check {
        match sampler.check_availability() {
            Ok(()) => {
                println!("{} is readable", sampler.path().display());
                return Ok(());
            }
            Err(e) => {
                eprintln!("CPU sampler is not available: {}", e);
                process::exit(1);
            }
        }
    }

    info!(
        threshold = config.threshold,
        interval_secs = config.interval,
        max_idle = config.max_idle,
        stat_path = %config.stat_path.display(),
        dry_run = config.dry_run,
        "starting idle monitor"
    );

    let power = shutdown::from_config(&config);
    let monitor = Monitor::new(&config, sampler, power);
    monitor::run(monitor, config.interval_duration(), args.json).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_threshold() {
        assert_eq!(validate_threshold("0.1"), Ok(0.1));
        assert!(validate_threshold("0").is_err());
        assert!(validate_threshold("1").is_err());
        assert!(validate_threshold("-0.5").is_err());
        assert!(validate_threshold("idle").is_err());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(threshold: 0.2, interval: 20, max_idle: 20)").unwrap();

        let args = Args::parse_from([
            "idlecatcher",
            "--config",
            path.to_str().unwrap(),
            "--max-idle",
            "3",
            "--shutdown-command",
            "systemctl poweroff",
        ]);
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.threshold, 0.2);
        assert_eq!(config.interval, 20);
        assert_eq!(config.max_idle, 3);
        assert_eq!(
            config.shutdown,
            ShutdownMethod::Command {
                program: "systemctl".to_owned(),
                args: vec!["poweroff".to_owned()],
            }
        );
    }

    #[test]
    fn test_cli_rejects_zero_interval() {
        assert!(Args::try_parse_from(["idlecatcher", "--interval", "0"]).is_err());
        assert!(Args::try_parse_from(["idlecatcher", "--max-idle", "0"]).is_err());
        assert!(Args::try_parse_from(["idlecatcher", "--threshold", "1.5"]).is_err());
    }

    #[test]
    fn test_cli_rejects_oversized_interval() {
        assert!(Args::try_parse_from(["idlecatcher", "--interval", "86400"]).is_ok());
        assert!(Args::try_parse_from(["idlecatcher", "--interval", "86401"]).is_err());
        assert!(
            Args::try_parse_from(["idlecatcher", "--interval", "18446744073709551615"]).is_err()
        );
    }

    #[test]
    fn test_invalid_file_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ron");
        std::fs::write(&path, "(threshold: 2.0)").unwrap();

        let args = Args::parse_from(["idlecatcher", "--config", path.to_str().unwrap()]);
        assert!(resolve_config(&args).is_err());
    }
}
