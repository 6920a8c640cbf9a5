//! Configuration module
//!
//! Options arrive as `NAME=VALUE` pairs on the command line, optionally on top
//! of a TOML file with the same keys. Both feed a [`RunOptions`] (every field
//! optional), which [`RunOptions::resolve`] turns into an immutable
//! [`RunConfig`] with defaults applied. [`validator::validate_config`] then
//! checks the result before any I/O happens.

pub mod cli;
pub mod options;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::BenchError;
use crate::target::detect_kind;
use crate::Result;

pub use options::{parse_size, OptionKey};

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;
pub const GB: u64 = 1024 * MB;

pub const DEFAULT_PATH: &str = "myfile.bin";
pub const DEFAULT_SIZE: u64 = GB;
pub const DEFAULT_BLOCK: u64 = MB;
pub const DEFAULT_SECTOR: u64 = 512;
pub const DEFAULT_REPEATS: u32 = 5;
pub const DEFAULT_DELAY_MS: u64 = 100;

/// Benchmark to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Read,
    Write,
    Copy,
    MapWrite,
    MapRead,
    /// Map-write repeats followed by map-read repeats
    Map,
    /// Write repeats, then read repeats, then copy repeats
    File,
}

impl OperationKind {
    /// Whether a copy phase runs, which needs `copypath`
    pub fn copies(&self) -> bool {
        matches!(self, OperationKind::Copy | OperationKind::File)
    }

    pub fn is_mapped(&self) -> bool {
        matches!(
            self,
            OperationKind::MapWrite | OperationKind::MapRead | OperationKind::Map
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Copy => "copy",
            OperationKind::MapWrite => "map-write",
            OperationKind::MapRead => "map-read",
            OperationKind::Map => "map",
            OperationKind::File => "file",
        }
    }
}

impl FromStr for OperationKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "read" => Ok(OperationKind::Read),
            "write" => Ok(OperationKind::Write),
            "copy" => Ok(OperationKind::Copy),
            "map-write" | "mapwrite" => Ok(OperationKind::MapWrite),
            "map-read" | "mapread" => Ok(OperationKind::MapRead),
            "map" => Ok(OperationKind::Map),
            "file" => Ok(OperationKind::File),
            _ => Err(BenchError::config(format!("VALUE INVALID: operation={}", s))),
        }
    }
}

/// What the path names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Device,
    File,
}

impl FromStr for TargetKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "device" => Ok(TargetKind::Device),
            "file" => Ok(TargetKind::File),
            _ => Err(BenchError::config(format!("VALUE INVALID: target={}", s))),
        }
    }
}

/// Offset order of requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Addressing {
    #[default]
    Sequential,
    PseudoRandom,
    HardwarePseudoRandom,
}

impl FromStr for Addressing {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" | "0" => Ok(Addressing::Sequential),
            "pseudo-random" | "random" | "1" => Ok(Addressing::PseudoRandom),
            "hardware-pseudo-random" | "rdrand" | "2" => Ok(Addressing::HardwarePseudoRandom),
            _ => Err(BenchError::config(format!("VALUE INVALID: addressing={}", s))),
        }
    }
}

/// Contents of written data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataMode {
    #[default]
    ZeroFill,
    PseudoRandom,
    HardwarePseudoRandom,
}

impl FromStr for DataMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "zero-fill" | "zeroes" | "zeros" | "0" => Ok(DataMode::ZeroFill),
            "pseudo-random" | "random" | "1" => Ok(DataMode::PseudoRandom),
            "hardware-pseudo-random" | "rdrand" | "2" => Ok(DataMode::HardwarePseudoRandom),
            _ => Err(BenchError::config(format!("VALUE INVALID: data={}", s))),
        }
    }
}

/// Timing precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precision {
    #[default]
    Fast,
    Slow,
}

impl FromStr for Precision {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fast" | "0" => Ok(Precision::Fast),
            "slow" | "1" => Ok(Precision::Slow),
            _ => Err(BenchError::config(format!("VALUE INVALID: precision={}", s))),
        }
    }
}

/// Unresolved options from TOML and the command line
///
/// Every field is optional so a TOML file and command-line options can be
/// layered; [`RunOptions::merge`] keeps the right-hand side's values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunOptions {
    pub path: Option<PathBuf>,
    pub operation: Option<OperationKind>,
    pub copypath: Option<PathBuf>,
    pub target: Option<TargetKind>,
    #[serde(default, deserialize_with = "toml::deserialize_size")]
    pub start: Option<u64>,
    #[serde(default, deserialize_with = "toml::deserialize_size")]
    pub stop: Option<u64>,
    #[serde(default, deserialize_with = "toml::deserialize_size")]
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "toml::deserialize_size")]
    pub block: Option<u64>,
    #[serde(default, deserialize_with = "toml::deserialize_size")]
    pub sector: Option<u64>,
    pub direct: Option<bool>,
    #[serde(alias = "wsync")]
    pub sync: Option<bool>,
    pub repeats: Option<u32>,
    pub wdelay: Option<u64>,
    pub rdelay: Option<u64>,
    #[serde(default, deserialize_with = "toml::deserialize_size")]
    pub zone: Option<u64>,
    pub precision: Option<Precision>,
    pub addressing: Option<Addressing>,
    pub data: Option<DataMode>,
    pub threads: Option<u32>,
    pub machinereadable: Option<bool>,
}

impl RunOptions {
    /// Overlay `other` on top of `self`
    ///
    /// `stop` and `size` travel together: if `other` sets either, both come
    /// from `other`.
    pub fn merge(self, other: RunOptions) -> RunOptions {
        let (stop, size) = if other.stop.is_some() || other.size.is_some() {
            (other.stop, other.size)
        } else {
            (self.stop, self.size)
        };

        RunOptions {
            path: other.path.or(self.path),
            operation: other.operation.or(self.operation),
            copypath: other.copypath.or(self.copypath),
            target: other.target.or(self.target),
            start: other.start.or(self.start),
            stop,
            size,
            block: other.block.or(self.block),
            sector: other.sector.or(self.sector),
            direct: other.direct.or(self.direct),
            sync: other.sync.or(self.sync),
            repeats: other.repeats.or(self.repeats),
            wdelay: other.wdelay.or(self.wdelay),
            rdelay: other.rdelay.or(self.rdelay),
            zone: other.zone.or(self.zone),
            precision: other.precision.or(self.precision),
            addressing: other.addressing.or(self.addressing),
            data: other.data.or(self.data),
            threads: other.threads.or(self.threads),
            machinereadable: other.machinereadable.or(self.machinereadable),
        }
    }

    /// Apply defaults and derive the final configuration
    ///
    /// `stop` and `size` are two spellings of the same range end; giving both
    /// is only accepted when they agree. When `target` is not given it is
    /// detected from the path.
    pub fn resolve(self) -> Result<RunConfig> {
        let path = self.path.unwrap_or_else(|| PathBuf::from(DEFAULT_PATH));
        let start = self.start.unwrap_or(0);

        let stop = match (self.stop, self.size) {
            (Some(stop), None) => stop,
            (None, Some(size)) => start
                .checked_add(size)
                .ok_or_else(|| BenchError::config("start + size overflows"))?,
            (None, None) => start
                .checked_add(DEFAULT_SIZE)
                .ok_or_else(|| BenchError::config("start + size overflows"))?,
            (Some(stop), Some(size)) => {
                if stop.checked_sub(start) != Some(size) {
                    return Err(BenchError::config(format!(
                        "stop ({}) and size ({}) disagree for start {}",
                        stop, size, start
                    )));
                }
                stop
            }
        };

        let target = match self.target {
            Some(kind) => kind,
            None => detect_kind(&path).map_err(|e| {
                BenchError::config(format!(
                    "cannot determine target type of {} ({})",
                    path.display(),
                    e
                ))
            })?,
        };

        let copy_path = self
            .copypath
            .unwrap_or_else(|| PathBuf::from(format!("{}.copy", path.display())));

        Ok(RunConfig {
            operation: self.operation.unwrap_or(OperationKind::Read),
            path,
            copy_path,
            target,
            start,
            stop,
            block: self.block.unwrap_or(DEFAULT_BLOCK),
            sector: self.sector.unwrap_or(DEFAULT_SECTOR),
            direct: self.direct.unwrap_or(true),
            sync: self.sync.unwrap_or(true),
            repeats: self.repeats.unwrap_or(DEFAULT_REPEATS),
            write_delay_ms: self.wdelay.unwrap_or(DEFAULT_DELAY_MS),
            read_delay_ms: self.rdelay.unwrap_or(DEFAULT_DELAY_MS),
            zone: self.zone.filter(|&size| size > 0),
            precision: self.precision.unwrap_or_default(),
            addressing: self.addressing.unwrap_or_default(),
            data: self.data.unwrap_or_default(),
            threads: self.threads.unwrap_or(1),
            machine_readable: self.machinereadable.unwrap_or(false),
        })
    }
}

/// Resolved, immutable run configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub operation: OperationKind,
    pub path: PathBuf,
    /// Copy destination
    pub copy_path: PathBuf,
    pub target: TargetKind,
    pub start: u64,
    pub stop: u64,
    /// Request size
    pub block: u64,
    pub sector: u64,
    pub direct: bool,
    /// Flush written data inside the timed interval
    pub sync: bool,
    pub repeats: u32,
    pub write_delay_ms: u64,
    pub read_delay_ms: u64,
    /// Bytes per separately timed zone of a read; `None` times the whole range
    pub zone: Option<u64>,
    pub precision: Precision,
    pub addressing: Addressing,
    pub data: DataMode,
    pub threads: u32,
    pub machine_readable: bool,
}

impl RunConfig {
    /// Bytes moved per repeat
    pub fn total(&self) -> u64 {
        self.stop - self.start
    }

    /// Byte used to fill written and prepared data
    pub fn fill_pattern(&self) -> u8 {
        match self.data {
            DataMode::ZeroFill => 0,
            // Rejected by validation
            DataMode::PseudoRandom | DataMode::HardwarePseudoRandom => 0,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            operation: OperationKind::Read,
            path: PathBuf::from(DEFAULT_PATH),
            copy_path: PathBuf::from(format!("{}.copy", DEFAULT_PATH)),
            target: TargetKind::File,
            start: 0,
            stop: DEFAULT_SIZE,
            block: DEFAULT_BLOCK,
            sector: DEFAULT_SECTOR,
            direct: true,
            sync: true,
            repeats: DEFAULT_REPEATS,
            write_delay_ms: DEFAULT_DELAY_MS,
            read_delay_ms: DEFAULT_DELAY_MS,
            zone: None,
            precision: Precision::Fast,
            addressing: Addressing::Sequential,
            data: DataMode::ZeroFill,
            threads: 1,
            machine_readable: false,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Device => write!(f, "device"),
            TargetKind::File => write!(f, "file"),
        }
    }
}

impl fmt::Display for Addressing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Addressing::Sequential => write!(f, "sequential"),
            Addressing::PseudoRandom => write!(f, "pseudo-random"),
            Addressing::HardwarePseudoRandom => write!(f, "hardware-pseudo-random"),
        }
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataMode::ZeroFill => write!(f, "zero-fill"),
            DataMode::PseudoRandom => write!(f, "pseudo-random"),
            DataMode::HardwarePseudoRandom => write!(f, "hardware-pseudo-random"),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Fast => write!(f, "fast"),
            Precision::Slow => write!(f, "slow"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let options = RunOptions {
            path: Some(temp_dir.path().join("bench.bin")),
            ..Default::default()
        };
        let config = options.resolve().unwrap();

        assert_eq!(config.operation, OperationKind::Read);
        assert_eq!(config.target, TargetKind::File);
        assert_eq!(config.start, 0);
        assert_eq!(config.stop, DEFAULT_SIZE);
        assert_eq!(config.block, MB);
        assert_eq!(config.repeats, 5);
        assert!(config.direct);
        assert!(config.sync);
        assert_eq!(config.copy_path, temp_dir.path().join("bench.bin.copy"));
    }

    #[test]
    fn test_resolve_size_from_start() {
        let options = RunOptions {
            target: Some(TargetKind::File),
            start: Some(4096),
            size: Some(8192),
            ..Default::default()
        };
        let config = options.resolve().unwrap();
        assert_eq!(config.stop, 12288);
        assert_eq!(config.total(), 8192);
    }

    #[test]
    fn test_resolve_stop_and_size_must_agree() {
        let options = RunOptions {
            target: Some(TargetKind::File),
            start: Some(0),
            stop: Some(8192),
            size: Some(8192),
            ..Default::default()
        };
        assert_eq!(options.resolve().unwrap().stop, 8192);

        let options = RunOptions {
            target: Some(TargetKind::File),
            stop: Some(8192),
            size: Some(4096),
            ..Default::default()
        };
        assert!(matches!(options.resolve(), Err(BenchError::Configuration(_))));
    }

    #[test]
    fn test_merge_prefers_right_hand_side() {
        let file = RunOptions {
            repeats: Some(3),
            block: Some(8192),
            ..Default::default()
        };
        let cli = RunOptions {
            repeats: Some(7),
            ..Default::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.repeats, Some(7));
        assert_eq!(merged.block, Some(8192));
    }

    #[test]
    fn test_merge_range_end_travels_together() {
        let file = RunOptions {
            stop: Some(GB),
            ..Default::default()
        };
        let cli = RunOptions {
            size: Some(MB),
            ..Default::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.stop, None);
        assert_eq!(merged.size, Some(MB));
    }

    #[test]
    fn test_operation_kinds() {
        assert!(OperationKind::File.copies());
        assert!(OperationKind::Copy.copies());
        assert!(!OperationKind::Map.copies());
        assert!(OperationKind::MapRead.is_mapped());
        assert!(!OperationKind::Read.is_mapped());
        assert!(!OperationKind::File.is_mapped());
    }

    #[test]
    fn test_zero_zone_times_whole_range() {
        let options = RunOptions {
            target: Some(TargetKind::File),
            zone: Some(0),
            ..Default::default()
        };
        assert_eq!(options.resolve().unwrap().zone, None);

        let options = RunOptions {
            target: Some(TargetKind::File),
            zone: Some(MB),
            ..Default::default()
        };
        assert_eq!(options.resolve().unwrap().zone, Some(MB));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("map-write".parse::<OperationKind>().unwrap(), OperationKind::MapWrite);
        assert_eq!("file".parse::<OperationKind>().unwrap(), OperationKind::File);
        assert_eq!("DEVICE".parse::<TargetKind>().unwrap(), TargetKind::Device);
        assert_eq!("sequential".parse::<Addressing>().unwrap(), Addressing::Sequential);
        assert_eq!("zero-fill".parse::<DataMode>().unwrap(), DataMode::ZeroFill);
        assert_eq!("slow".parse::<Precision>().unwrap(), Precision::Slow);
        assert!("sideways".parse::<OperationKind>().is_err());
    }
}
