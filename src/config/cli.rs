//! CLI argument parsing using clap
//!
//! Benchmark options stay in the `NAME=VALUE` form (parsed by
//! [`super::options`]); clap handles the positional list plus the flags that
//! control the binary itself.

use clap::Parser;
use std::path::PathBuf;

/// storbench - sequential storage throughput benchmark
#[derive(Parser, Debug)]
#[command(name = "storbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Benchmark options as NAME=VALUE (e.g., operation=write size=256M block=1M)
    #[arg(value_name = "NAME=VALUE")]
    pub options: Vec<String>,

    /// TOML file with the same option names; command-line options override it
    #[arg(short = 'c', long, env = "STORBENCH_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Start without the Y/N confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Write a JSON report to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Validate and print the configuration, then exit
    #[arg(long)]
    pub dry_run: bool,

    /// Log phase progress to stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default log filter when RUST_LOG is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "storbench=info"
        } else {
            "warn"
        }
    }
}
