//! Per-phase setup, timed transfer and teardown
//!
//! A [`PhasePlan`] knows how to build one repeat of one phase. `setup()` does
//! everything that must stay outside the timed interval (temp-file
//! preparation, open, seek, buffer allocation, mapping) and hands back a
//! [`PhaseSession`]. The session's `transfer()` is the timed part, including
//! the flush when sync is on. `teardown()` releases everything and returns
//! the failures instead of stopping on them.
//!
//! A read can be profiled across its range: with a zone size set, the session
//! reports one zone per `zone` bytes and each `transfer()` call moves the next
//! zone, so every zone is timed and recorded on its own.
//!
//! | operation | phase | plan |
//! |-----------|-------|------|
//! | read (device) | Read | [`DeviceReadPlan`] |
//! | read (file) | Read | [`FileReadPlan`] |
//! | write | Write | [`FileWritePlan`] |
//! | copy | Copy | [`CopyPlan`] |
//! | map-write / map-read | Write / Read | [`MapPlan`] |
//! | file | Write, Read, Copy | [`FileWritePlan`], [`FileReadPlan`], [`CopyPlan`] |

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{OperationKind, RunConfig, TargetKind};
use crate::engine::mmap::MappedRegion;
use crate::engine::run;
use crate::engine::sync::{FdReader, FdWriter, SendfileCopy};
use crate::error::{BenchError, TransferError};
use crate::stats::Phase;
use crate::target::{BlockTarget, FileTarget, OpenFlags, Target};
use crate::util::{AlignedBuffer, PAGE_SIZE};
use crate::Result;

/// Pattern byte the mapped write walk stores over a '0'-filled file
pub const MAP_WRITE_PATTERN: u8 = b'1';
pub const MAP_FILL_PATTERN: u8 = b'0';

/// Resources of one repeat between setup and teardown
pub trait PhaseSession {
    /// Separately timed zones in this repeat
    fn zones(&self) -> u64 {
        1
    }

    /// Start offset of `zone`; `None` unless the range is profiled
    fn zone_offset(&self, _zone: u64) -> Option<u64> {
        None
    }

    /// Timed part for the next zone: the transfer plus the flush when sync is on
    fn transfer(&mut self) -> Result<u64>;

    /// Release everything; failures are returned, not raised
    fn teardown(self: Box<Self>) -> Vec<BenchError>;
}

/// Builder of per-repeat sessions for one phase
pub trait PhasePlan {
    fn phase(&self) -> Phase;

    /// Settle time between setup and the timed interval
    fn delay(&self) -> Duration;

    fn setup(&mut self, repeat: u32) -> Result<Box<dyn PhaseSession>>;
}

/// Plans for every phase of `config.operation`, in execution order
pub fn plans_for(config: &RunConfig) -> Vec<Box<dyn PhasePlan>> {
    match config.operation {
        OperationKind::Read => match config.target {
            TargetKind::Device => vec![Box::new(DeviceReadPlan::new(config))],
            TargetKind::File => vec![Box::new(FileReadPlan::new(config))],
        },
        OperationKind::Write => vec![Box::new(FileWritePlan::new(config))],
        OperationKind::Copy => vec![Box::new(CopyPlan::new(config))],
        OperationKind::MapWrite => vec![Box::new(MapPlan::new(config, Phase::Write))],
        OperationKind::MapRead => vec![Box::new(MapPlan::new(config, Phase::Read))],
        OperationKind::Map => vec![
            Box::new(MapPlan::new(config, Phase::Write)),
            Box::new(MapPlan::new(config, Phase::Read)),
        ],
        OperationKind::File => vec![
            Box::new(FileWritePlan::new(config)),
            Box::new(FileReadPlan::new(config)),
            Box::new(CopyPlan::new(config)),
        ],
    }
}

fn delay_for(config: &RunConfig, phase: Phase) -> Duration {
    match phase {
        Phase::Write => Duration::from_millis(config.write_delay_ms),
        Phase::Read | Phase::Copy => Duration::from_millis(config.read_delay_ms),
    }
}

/// Collects teardown failures
#[derive(Default)]
struct TeardownLog(Vec<BenchError>);

impl TeardownLog {
    fn check(&mut self, operation: &'static str, path: &Path, result: io::Result<()>) {
        if let Err(source) = result {
            self.0.push(BenchError::Teardown {
                operation,
                path: path.to_path_buf(),
                source,
            });
        }
    }

    fn close(&mut self, target: &mut dyn Target, operation: &'static str) {
        let path = target.path().to_path_buf();
        let result = target.close();
        self.check(operation, &path, result);
    }

    fn remove(&mut self, path: &Path) {
        self.check("file delete", path, FileTarget::remove(path));
    }
}

/// Remove temp files after a failed setup, then pass the error on
fn discard_on_error<T>(result: Result<T>, paths: &[&Path]) -> Result<T> {
    if result.is_err() {
        for path in paths {
            if let Err(e) = FileTarget::remove(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file after setup error");
                }
            }
        }
    }
    result
}

fn seek(target: &dyn Target, offset: u64, operation: &'static str) -> Result<()> {
    target.seek(offset).map_err(|source| BenchError::Open {
        operation,
        path: target.path().to_path_buf(),
        source,
    })
}

fn transfer_error<'a>(
    operation: &'static str,
    path: &'a Path,
) -> impl FnOnce(TransferError) -> BenchError + 'a {
    move |source| BenchError::Transfer {
        operation,
        path: path.to_path_buf(),
        source,
    }
}

fn request_size(config: &RunConfig) -> usize {
    // Bounded by validation
    config.block as usize
}

/// Read a device in place
pub struct DeviceReadPlan {
    path: PathBuf,
    start: u64,
    total: u64,
    block: usize,
    zone: Option<u64>,
    direct: bool,
    delay: Duration,
}

impl DeviceReadPlan {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            path: config.path.clone(),
            start: config.start,
            total: config.total(),
            block: request_size(config),
            zone: config.zone,
            direct: config.direct,
            delay: delay_for(config, Phase::Read),
        }
    }
}

impl PhasePlan for DeviceReadPlan {
    fn phase(&self) -> Phase {
        Phase::Read
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn setup(&mut self, _repeat: u32) -> Result<Box<dyn PhaseSession>> {
        let flags = OpenFlags {
            direct: self.direct,
            ..Default::default()
        };
        let target = BlockTarget::open(&self.path, flags)?;
        let stop = self.start + self.total;
        if stop > target.size() {
            return Err(BenchError::Open {
                operation: "device size check",
                path: self.path.clone(),
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("range ends at {} past the device end at {}", stop, target.size()),
                ),
            });
        }
        seek(&target, self.start, "device seek")?;
        let buffer = AlignedBuffer::allocate(self.block, PAGE_SIZE)?;

        Ok(Box::new(ReadSession {
            target: Box::new(target),
            buffer,
            start: self.start,
            total: self.total,
            completed: 0,
            block: self.block,
            zone: self.zone,
            operation: "device read",
            temp_file: None,
        }))
    }
}

/// Read a freshly prepared temp file
pub struct FileReadPlan {
    path: PathBuf,
    start: u64,
    stop: u64,
    block: usize,
    zone: Option<u64>,
    flags: OpenFlags,
    pattern: u8,
    delay: Duration,
}

impl FileReadPlan {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            path: config.path.clone(),
            start: config.start,
            stop: config.stop,
            block: request_size(config),
            zone: config.zone,
            flags: OpenFlags {
                direct: config.direct,
                sync: config.sync,
                ..Default::default()
            },
            pattern: config.fill_pattern(),
            delay: delay_for(config, Phase::Read),
        }
    }
}

impl PhasePlan for FileReadPlan {
    fn phase(&self) -> Phase {
        Phase::Read
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn setup(&mut self, _repeat: u32) -> Result<Box<dyn PhaseSession>> {
        let session = (|| -> Result<Box<dyn PhaseSession>> {
            FileTarget::prepare(&self.path, self.stop, self.pattern, self.flags)?;
            let target = FileTarget::open(
                &self.path,
                OpenFlags {
                    sync: false,
                    ..self.flags
                },
            )?;
            seek(&target, self.start, "file seek")?;
            let buffer = AlignedBuffer::allocate(self.block, PAGE_SIZE)?;

            Ok(Box::new(ReadSession {
                target: Box::new(target),
                buffer,
                start: self.start,
                total: self.stop - self.start,
                completed: 0,
                block: self.block,
                zone: self.zone,
                operation: "file read",
                temp_file: Some(self.path.clone()),
            }) as Box<dyn PhaseSession>)
        })();

        discard_on_error(session, &[&self.path])
    }
}

struct ReadSession {
    target: Box<dyn Target>,
    buffer: AlignedBuffer,
    start: u64,
    total: u64,
    completed: u64,
    block: usize,
    zone: Option<u64>,
    operation: &'static str,
    temp_file: Option<PathBuf>,
}

impl PhaseSession for ReadSession {
    fn zones(&self) -> u64 {
        match self.zone {
            Some(zone) => self.total.div_ceil(zone).max(1),
            None => 1,
        }
    }

    fn zone_offset(&self, zone: u64) -> Option<u64> {
        self.zone.map(|size| self.start + zone * size)
    }

    fn transfer(&mut self) -> Result<u64> {
        let remaining = self.total - self.completed;
        let length = self.zone.map_or(remaining, |zone| zone.min(remaining));

        let mut reader = FdReader::new(self.target.fd(), &mut self.buffer);
        let bytes = run(&mut reader, length, self.block)
            .map_err(transfer_error(self.operation, self.target.path()))?;
        self.completed += bytes;
        Ok(bytes)
    }

    fn teardown(self: Box<Self>) -> Vec<BenchError> {
        let ReadSession {
            mut target,
            buffer,
            temp_file,
            ..
        } = *self;
        let mut log = TeardownLog::default();

        buffer.release();
        let close_operation = if temp_file.is_some() { "file close" } else { "device close" };
        log.close(target.as_mut(), close_operation);
        if let Some(path) = temp_file {
            log.remove(&path);
        }
        log.0
    }
}

/// Write a new temp file
pub struct FileWritePlan {
    path: PathBuf,
    start: u64,
    total: u64,
    block: usize,
    flags: OpenFlags,
    pattern: u8,
    delay: Duration,
}

impl FileWritePlan {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            path: config.path.clone(),
            start: config.start,
            total: config.total(),
            block: request_size(config),
            flags: OpenFlags {
                direct: config.direct,
                sync: config.sync,
                ..Default::default()
            },
            pattern: config.fill_pattern(),
            delay: delay_for(config, Phase::Write),
        }
    }
}

impl PhasePlan for FileWritePlan {
    fn phase(&self) -> Phase {
        Phase::Write
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn setup(&mut self, _repeat: u32) -> Result<Box<dyn PhaseSession>> {
        let session = (|| -> Result<Box<dyn PhaseSession>> {
            let target = FileTarget::create(&self.path, self.flags)?;
            seek(&target, self.start, "file seek")?;
            let mut buffer = AlignedBuffer::allocate(self.block, PAGE_SIZE)?;
            buffer.fill(self.pattern);

            Ok(Box::new(WriteSession {
                target,
                buffer,
                total: self.total,
                block: self.block,
                sync: self.flags.sync,
            }) as Box<dyn PhaseSession>)
        })();

        discard_on_error(session, &[&self.path])
    }
}

struct WriteSession {
    target: FileTarget,
    buffer: AlignedBuffer,
    total: u64,
    block: usize,
    sync: bool,
}

impl PhaseSession for WriteSession {
    fn transfer(&mut self) -> Result<u64> {
        let mut writer = FdWriter::new(self.target.fd(), &self.buffer);
        let bytes = run(&mut writer, self.total, self.block)
            .map_err(transfer_error("file write", self.target.path()))?;
        if self.sync {
            self.target.sync()?;
        }
        Ok(bytes)
    }

    fn teardown(self: Box<Self>) -> Vec<BenchError> {
        let WriteSession {
            mut target, buffer, ..
        } = *self;
        let mut log = TeardownLog::default();

        buffer.release();
        let path = target.path().to_path_buf();
        log.close(&mut target, "file close");
        log.remove(&path);
        log.0
    }
}

/// Kernel copy between two temp files
pub struct CopyPlan {
    source: PathBuf,
    destination: PathBuf,
    start: u64,
    stop: u64,
    block: usize,
    flags: OpenFlags,
    pattern: u8,
    delay: Duration,
}

impl CopyPlan {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            source: config.path.clone(),
            destination: config.copy_path.clone(),
            start: config.start,
            stop: config.stop,
            block: request_size(config),
            flags: OpenFlags {
                direct: config.direct,
                sync: config.sync,
                ..Default::default()
            },
            pattern: config.fill_pattern(),
            delay: delay_for(config, Phase::Copy),
        }
    }
}

impl PhasePlan for CopyPlan {
    fn phase(&self) -> Phase {
        Phase::Copy
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn setup(&mut self, _repeat: u32) -> Result<Box<dyn PhaseSession>> {
        let session = (|| -> Result<Box<dyn PhaseSession>> {
            FileTarget::prepare(&self.source, self.stop, self.pattern, self.flags)?;
            let source = FileTarget::open(&self.source, self.flags)?;
            seek(&source, self.start, "file seek")?;
            let destination = FileTarget::create(&self.destination, self.flags)?;

            Ok(Box::new(CopySession {
                source,
                destination,
                total: self.stop - self.start,
                block: self.block,
                sync: self.flags.sync,
            }) as Box<dyn PhaseSession>)
        })();

        discard_on_error(session, &[&self.source, &self.destination])
    }
}

struct CopySession {
    source: FileTarget,
    destination: FileTarget,
    total: u64,
    block: usize,
    sync: bool,
}

impl PhaseSession for CopySession {
    fn transfer(&mut self) -> Result<u64> {
        let mut copy = SendfileCopy::new(self.destination.fd(), self.source.fd());
        let bytes = run(&mut copy, self.total, self.block)
            .map_err(transfer_error("file copy", self.destination.path()))?;
        if self.sync {
            self.destination.sync()?;
        }
        Ok(bytes)
    }

    fn teardown(self: Box<Self>) -> Vec<BenchError> {
        let CopySession {
            mut source,
            mut destination,
            ..
        } = *self;
        let mut log = TeardownLog::default();

        let source_path = source.path().to_path_buf();
        let destination_path = destination.path().to_path_buf();
        log.close(&mut source, "file close");
        log.close(&mut destination, "file close");
        log.remove(&source_path);
        log.remove(&destination_path);
        log.0
    }
}

/// Page walk over a shared mapping of a prepared temp file
pub struct MapPlan {
    phase: Phase,
    path: PathBuf,
    total: u64,
    flags: OpenFlags,
    delay: Duration,
}

impl MapPlan {
    /// `phase` is `Write` for the store walk and `Read` for the load walk
    pub fn new(config: &RunConfig, phase: Phase) -> Self {
        Self {
            phase,
            path: config.path.clone(),
            total: config.total(),
            flags: OpenFlags {
                direct: config.direct,
                sync: config.sync,
                ..Default::default()
            },
            delay: delay_for(config, phase),
        }
    }
}

impl PhasePlan for MapPlan {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn setup(&mut self, _repeat: u32) -> Result<Box<dyn PhaseSession>> {
        let session = (|| -> Result<Box<dyn PhaseSession>> {
            FileTarget::prepare(&self.path, self.total, MAP_FILL_PATTERN, self.flags)?;
            let target = FileTarget::open(
                &self.path,
                OpenFlags {
                    write: true,
                    ..self.flags
                },
            )?;

            // Bounded by validation
            let len = self.total as usize;
            let region = MappedRegion::map(target.fd(), len).map_err(|source| BenchError::Mapping {
                path: self.path.clone(),
                source,
            })?;

            Ok(Box::new(MapSession {
                target,
                region: Some(region),
                len,
                write: self.phase == Phase::Write,
                sync: self.flags.sync,
            }) as Box<dyn PhaseSession>)
        })();

        discard_on_error(session, &[&self.path])
    }
}

struct MapSession {
    target: FileTarget,
    region: Option<MappedRegion>,
    len: usize,
    write: bool,
    sync: bool,
}

impl PhaseSession for MapSession {
    fn transfer(&mut self) -> Result<u64> {
        let path = self.target.path();
        let region = match self.region.as_mut() {
            Some(region) => region,
            None => {
                return Err(BenchError::Mapping {
                    path: path.to_path_buf(),
                    source: io::Error::from_raw_os_error(libc::EBADF),
                })
            }
        };

        let bytes = if self.write {
            run(&mut region.walk_write(MAP_WRITE_PATTERN), self.len as u64, self.len)
                .map_err(transfer_error("mapped write", path))?
        } else {
            run(&mut region.walk_read(), self.len as u64, self.len)
                .map_err(transfer_error("mapped read", path))?
        };

        if self.write && self.sync {
            region.sync().map_err(|source| BenchError::Flush {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(bytes)
    }

    fn teardown(self: Box<Self>) -> Vec<BenchError> {
        let MapSession {
            mut target, region, ..
        } = *self;
        let mut log = TeardownLog::default();

        let path = target.path().to_path_buf();
        if let Some(region) = region {
            log.check("file un-mapping", &path, region.unmap());
        }
        log.close(&mut target, "file close");
        log.remove(&path);
        log.0
    }
}
