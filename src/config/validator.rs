//! Configuration validation
//!
//! Runs before any benchmark I/O. Every rejection is a
//! `BenchError::Configuration` naming the offending option, which maps to
//! exit code 1.

use super::*;
use crate::target::block::device_size;

/// Largest start/stop offset
pub const OFFSET_MAX: u64 = 10 * GB;
pub const BLOCK_MIN: u64 = 4096;
pub const BLOCK_MAX: u64 = GB;
pub const SECTOR_MIN: u64 = 512;
pub const SECTOR_MAX: u64 = 64 * KB;
pub const REPEATS_MAX: u32 = 100;
pub const DELAY_MAX_MS: u64 = 100_000;
/// Mapped file size limits
pub const MAP_SIZE_MIN: u64 = 4096;
pub const MAP_SIZE_MAX: u64 = 3 * GB / 2;

/// Validate complete configuration
///
/// Device targets are also opened to check that `stop` lies within the
/// device.
pub fn validate_config(config: &RunConfig) -> Result<()> {
    validate_unsupported(config)?;
    validate_range(config)?;
    validate_alignment(config)?;
    validate_runtime(config)?;
    validate_target(config)?;
    validate_zone(config)?;

    if config.target == TargetKind::Device {
        validate_device_size(config)?;
    }

    Ok(())
}

/// Options that are recognized but only accept one value
pub fn validate_unsupported(config: &RunConfig) -> Result<()> {
    if config.threads != 1 {
        return Err(BenchError::config(format!(
            "threads={} is not supported, only single-threaded runs",
            config.threads
        )));
    }
    if config.addressing != Addressing::Sequential {
        return Err(BenchError::config(format!(
            "addressing={} is not supported, only sequential",
            config.addressing
        )));
    }
    if config.data != DataMode::ZeroFill {
        return Err(BenchError::config(format!(
            "data={} is not supported, only zero-fill",
            config.data
        )));
    }
    if config.precision != Precision::Fast {
        return Err(BenchError::config(format!(
            "precision={} is not supported, only fast",
            config.precision
        )));
    }
    if config.machine_readable {
        return Err(BenchError::config(
            "machinereadable=1 is not supported, only text output",
        ));
    }
    Ok(())
}

/// Start/stop/block/sector limits
pub fn validate_range(config: &RunConfig) -> Result<()> {
    if config.start > config.stop {
        return Err(BenchError::config(format!(
            "start ({}) must not exceed stop ({})",
            config.start, config.stop
        )));
    }
    if config.stop > OFFSET_MAX {
        return Err(BenchError::config(format!(
            "stop must be at most {} bytes, got {}",
            OFFSET_MAX, config.stop
        )));
    }
    if config.block < BLOCK_MIN || config.block > BLOCK_MAX {
        return Err(BenchError::config(format!(
            "block must be from {} to {} bytes, got {}",
            BLOCK_MIN, BLOCK_MAX, config.block
        )));
    }
    if !config.sector.is_power_of_two() || config.sector < SECTOR_MIN || config.sector > SECTOR_MAX {
        return Err(BenchError::config(format!(
            "sector must be a power of 2 from {} to {} bytes, got {}",
            SECTOR_MIN, SECTOR_MAX, config.sector
        )));
    }
    if usize::try_from(config.total()).is_err() {
        return Err(BenchError::config(format!(
            "size {} does not fit the platform address space",
            config.total()
        )));
    }
    Ok(())
}

/// O_DIRECT needs sector-aligned offsets and lengths
pub fn validate_alignment(config: &RunConfig) -> Result<()> {
    if !config.direct {
        return Ok(());
    }

    let sector = config.sector;
    for (name, value) in [
        ("block", config.block),
        ("start", config.start),
        ("size", config.total()),
    ] {
        if value % sector != 0 {
            return Err(BenchError::config(format!(
                "{} ({}) must be a multiple of the sector size ({}) with direct=1",
                name, value, sector
            )));
        }
    }
    Ok(())
}

/// Repeats and delays
pub fn validate_runtime(config: &RunConfig) -> Result<()> {
    if config.repeats > REPEATS_MAX {
        return Err(BenchError::config(format!(
            "Repeats must be from 0 to {} times, got {}",
            REPEATS_MAX, config.repeats
        )));
    }
    if config.write_delay_ms > DELAY_MAX_MS {
        return Err(BenchError::config(format!(
            "Write delay must be from 0 to {} milliseconds, got {}",
            DELAY_MAX_MS, config.write_delay_ms
        )));
    }
    if config.read_delay_ms > DELAY_MAX_MS {
        return Err(BenchError::config(format!(
            "Read delay must be from 0 to {} milliseconds, got {}",
            DELAY_MAX_MS, config.read_delay_ms
        )));
    }
    Ok(())
}

/// Operation and target compatibility
pub fn validate_target(config: &RunConfig) -> Result<()> {
    if config.target == TargetKind::Device && config.operation != OperationKind::Read {
        return Err(BenchError::config(format!(
            "operation={} needs a file target, devices are read-only",
            config.operation
        )));
    }

    if config.operation.is_mapped() {
        let total = config.total();
        if !(MAP_SIZE_MIN..=MAP_SIZE_MAX).contains(&total) {
            return Err(BenchError::config(format!(
                "file size must be from {} to {} bytes for mapped operations, got {}",
                MAP_SIZE_MIN, MAP_SIZE_MAX, total
            )));
        }
    }

    if config.operation.copies() && config.copy_path == config.path {
        return Err(BenchError::config(
            "copypath must differ from path",
        ));
    }
    Ok(())
}

/// Zones split a read into separately timed spans of whole requests
pub fn validate_zone(config: &RunConfig) -> Result<()> {
    let Some(zone) = config.zone else {
        return Ok(());
    };

    if config.operation != OperationKind::Read {
        return Err(BenchError::config(format!(
            "zone applies to operation=read only, got operation={}",
            config.operation
        )));
    }
    if zone < config.block || zone % config.block != 0 {
        return Err(BenchError::config(format!(
            "zone ({}) must be a multiple of block ({})",
            zone, config.block
        )));
    }
    Ok(())
}

/// The requested range must lie within the device
pub fn validate_device_size(config: &RunConfig) -> Result<()> {
    let size = device_size(&config.path).map_err(|e| {
        BenchError::config(format!(
            "cannot query device size of {} ({})",
            config.path.display(),
            e
        ))
    })?;

    if config.stop > size {
        return Err(BenchError::config(format!(
            "stop ({}) exceeds device size ({}) of {}",
            config.stop,
            size,
            config.path.display()
        )));
    }
    Ok(())
}
