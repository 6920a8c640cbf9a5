//! TOML configuration file parsing
//!
//! The file uses the same keys as the command line:
//!
//! ```toml
//! path = "/mnt/scratch/bench.bin"
//! operation = "map"
//! size = "256M"
//! block = "1M"
//! direct = true
//! sync = true
//! repeats = 5
//! wdelay = 100
//! rdelay = 100
//! ```
//!
//! Size keys accept either an integer byte count or a string with a K/M/G
//! suffix.

use super::options::{parse_assignments, parse_size};
use super::RunOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<RunOptions> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<RunOptions> {
    let options: RunOptions =
        ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(options)
}

/// Merge command-line options with the TOML configuration (command line takes precedence)
pub fn merge_cli_with_config<S: AsRef<str>>(
    assignments: &[S],
    config: Option<RunOptions>,
) -> crate::Result<RunOptions> {
    let cli = parse_assignments(assignments)?;
    Ok(config.unwrap_or_default().merge(cli))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Bytes(u64),
    Text(String),
}

/// Accept `4096` or `"4K"`
pub(crate) fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<SizeValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(SizeValue::Bytes(n)) => Ok(Some(n)),
        Some(SizeValue::Text(s)) => parse_size(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OperationKind, TargetKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_parse_toml_basic() {
        let toml = r#"
            path = "/tmp/bench.bin"
            operation = "map-write"
            size = "16M"
            block = 65536
            direct = false
            wsync = true
            repeats = 3
            wdelay = 0
        "#;

        let options = parse_toml_string(toml).unwrap();
        assert_eq!(options.path, Some(PathBuf::from("/tmp/bench.bin")));
        assert_eq!(options.operation, Some(OperationKind::MapWrite));
        assert_eq!(options.size, Some(16 * 1024 * 1024));
        assert_eq!(options.block, Some(65536));
        assert_eq!(options.direct, Some(false));
        assert_eq!(options.sync, Some(true));
        assert_eq!(options.repeats, Some(3));
        assert_eq!(options.wdelay, Some(0));
        assert_eq!(options.rdelay, None);
    }

    #[test]
    fn test_parse_toml_rejects_unknown_key() {
        assert!(parse_toml_string("queue_depth = 32").is_err());
    }

    #[test]
    fn test_parse_toml_rejects_bad_size() {
        assert!(parse_toml_string(r#"block = "lots""#).is_err());
    }

    #[test]
    fn test_parse_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bench.toml");
        fs::write(&config_path, "operation = \"copy\"\ntarget = \"file\"\n").unwrap();

        let options = parse_toml_file(&config_path).unwrap();
        assert_eq!(options.operation, Some(OperationKind::Copy));
        assert_eq!(options.target, Some(TargetKind::File));

        assert!(parse_toml_file(&temp_dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_cli_overrides_toml() {
        let file = parse_toml_string("repeats = 3\nblock = \"8K\"\n").unwrap();
        let merged = merge_cli_with_config(&["repeats=10"], Some(file)).unwrap();
        assert_eq!(merged.repeats, Some(10));
        assert_eq!(merged.block, Some(8192));

        let cli_only = merge_cli_with_config(&["block=4K"], None).unwrap();
        assert_eq!(cli_only.block, Some(4096));
    }
}
