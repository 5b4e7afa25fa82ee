//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "xwaves", version, about = "Time-resolved delay-scan CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/xwaves.toml")]
    pub config: PathBuf,

    /// Log as JSON lines and print packets/summaries as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace|off); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an experiment on the simulated stage and lock-in
    Scan {
        /// Experiment preset (JSON)
        #[arg(long, value_name = "FILE")]
        preset: PathBuf,
        /// Override the number of scans from the preset
        #[arg(long, value_name = "N")]
        scans: Option<u32>,
        /// Output root (default: output.directory from the config)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Do not write CSV files
        #[arg(long, action = ArgAction::SetTrue)]
        no_save: bool,
        /// Print per-phase step timing stats
        #[arg(long, action = ArgAction::SetTrue)]
        stats: bool,
    },
    /// Estimate how long an experiment will take
    Estimate {
        #[arg(long, value_name = "FILE")]
        preset: PathBuf,
    },
    /// Print the expanded position list
    Positions {
        #[arg(long, value_name = "FILE")]
        preset: PathBuf,
    },
    /// Write a starter experiment preset
    Preset {
        /// Destination JSON file (must not exist)
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Quick health check (config valid, simulated devices respond)
    SelfCheck,
}
