//! `NAME=VALUE` command-line options
//!
//! Each recognized name maps to one [`OptionKey`] variant, and each variant
//! owns a typed setter into [`RunOptions`]. Names are case-insensitive.

use std::path::PathBuf;

use super::RunOptions;
use crate::error::BenchError;
use crate::Result;

/// Recognized option names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    Path,
    Operation,
    CopyPath,
    Target,
    Addressing,
    Data,
    Threads,
    Start,
    Stop,
    Size,
    Block,
    Sector,
    Direct,
    Sync,
    Precision,
    WriteDelay,
    ReadDelay,
    Repeats,
    Zone,
    MachineReadable,
}

impl OptionKey {
    pub const ALL: [OptionKey; 20] = [
        OptionKey::Path,
        OptionKey::Operation,
        OptionKey::CopyPath,
        OptionKey::Target,
        OptionKey::Addressing,
        OptionKey::Data,
        OptionKey::Threads,
        OptionKey::Start,
        OptionKey::Stop,
        OptionKey::Size,
        OptionKey::Block,
        OptionKey::Sector,
        OptionKey::Direct,
        OptionKey::Sync,
        OptionKey::Precision,
        OptionKey::WriteDelay,
        OptionKey::ReadDelay,
        OptionKey::Repeats,
        OptionKey::Zone,
        OptionKey::MachineReadable,
    ];

    /// Canonical option name
    pub fn name(&self) -> &'static str {
        match self {
            OptionKey::Path => "path",
            OptionKey::Operation => "operation",
            OptionKey::CopyPath => "copypath",
            OptionKey::Target => "target",
            OptionKey::Addressing => "addressing",
            OptionKey::Data => "data",
            OptionKey::Threads => "threads",
            OptionKey::Start => "start",
            OptionKey::Stop => "stop",
            OptionKey::Size => "size",
            OptionKey::Block => "block",
            OptionKey::Sector => "sector",
            OptionKey::Direct => "direct",
            OptionKey::Sync => "sync",
            OptionKey::Precision => "precision",
            OptionKey::WriteDelay => "wdelay",
            OptionKey::ReadDelay => "rdelay",
            OptionKey::Repeats => "repeats",
            OptionKey::Zone => "zone",
            OptionKey::MachineReadable => "machinereadable",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name == "wsync" {
            return Some(OptionKey::Sync);
        }
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    /// Parse `value` and store it in `options`
    pub fn apply(&self, options: &mut RunOptions, value: &str) -> Result<()> {
        match self {
            OptionKey::Path => options.path = Some(parse_path(self, value)?),
            OptionKey::Operation => options.operation = Some(value.parse()?),
            OptionKey::CopyPath => options.copypath = Some(parse_path(self, value)?),
            OptionKey::Target => options.target = Some(value.parse()?),
            OptionKey::Addressing => options.addressing = Some(value.parse()?),
            OptionKey::Data => options.data = Some(value.parse()?),
            OptionKey::Threads => options.threads = Some(parse_number(value)?),
            OptionKey::Start => options.start = Some(parse_size(value)?),
            OptionKey::Stop => options.stop = Some(parse_size(value)?),
            OptionKey::Size => options.size = Some(parse_size(value)?),
            OptionKey::Block => options.block = Some(parse_size(value)?),
            OptionKey::Sector => options.sector = Some(parse_size(value)?),
            OptionKey::Direct => options.direct = Some(parse_flag(self, value)?),
            OptionKey::Sync => options.sync = Some(parse_flag(self, value)?),
            OptionKey::Precision => options.precision = Some(value.parse()?),
            OptionKey::WriteDelay => options.wdelay = Some(parse_number(value)?),
            OptionKey::ReadDelay => options.rdelay = Some(parse_number(value)?),
            OptionKey::Repeats => options.repeats = Some(parse_number(value)?),
            OptionKey::Zone => options.zone = Some(parse_size(value)?),
            OptionKey::MachineReadable => options.machinereadable = Some(parse_flag(self, value)?),
        }
        Ok(())
    }
}

/// Parse `NAME=VALUE` arguments into options
pub fn parse_assignments<S: AsRef<str>>(args: &[S]) -> Result<RunOptions> {
    let mut options = RunOptions::default();
    for arg in args {
        let (key, value) = split_assignment(arg.as_ref())?;
        key.apply(&mut options, value)?;
    }
    Ok(options)
}

fn split_assignment(arg: &str) -> Result<(OptionKey, &str)> {
    if arg.len() < 3 {
        return Err(BenchError::config(format!("OPTION TOO SHORT: {}", arg)));
    }

    let (name, value) = arg
        .split_once('=')
        .filter(|(name, value)| !name.is_empty() && !value.is_empty())
        .ok_or_else(|| BenchError::config(format!("OPTION INVALID: {}", arg)))?;

    let key = OptionKey::from_name(name)
        .ok_or_else(|| BenchError::config(format!("OPTION NOT RECOGNIZED: {}", name)))?;

    Ok((key, value))
}

/// Parse a size string (e.g., "1G", "100M", "4k") to bytes
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with('k') || s.ends_with("kb") {
        (s.trim_end_matches("kb").trim_end_matches('k'), 1024u64)
    } else if s.ends_with('m') || s.ends_with("mb") {
        (s.trim_end_matches("mb").trim_end_matches('m'), 1024 * 1024)
    } else if s.ends_with('g') || s.ends_with("gb") {
        (s.trim_end_matches("gb").trim_end_matches('g'), 1024 * 1024 * 1024)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| BenchError::config(format!("NOT A NUMBER: {}", s)))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| BenchError::config(format!("NOT A BLOCK SIZE: {}", s)))
}

fn parse_number<T: std::str::FromStr>(s: &str) -> Result<T> {
    s.trim()
        .parse()
        .map_err(|_| BenchError::config(format!("NOT A NUMBER: {}", s)))
}

fn parse_flag(key: &OptionKey, s: &str) -> Result<bool> {
    match s.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(BenchError::config(format!(
            "VALUE INVALID: {}={} (expected 0 or 1)",
            key.name(),
            s
        ))),
    }
}

fn parse_path(key: &OptionKey, s: &str) -> Result<PathBuf> {
    if s.is_empty() {
        return Err(BenchError::config(format!("VALUE INVALID: {}=", key.name())));
    }
    Ok(PathBuf::from(s))
}
