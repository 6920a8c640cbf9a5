//! Benchmark targets
//!
//! A target is an open descriptor on a regular file or a block device,
//! together with the path it was opened from so errors can name it.
//!
//! - **FileTarget**: temp files created and removed by the benchmark
//! - **BlockTarget**: an existing block device, opened read-only
//!
//! Targets own their descriptor. `close()` reports failure so teardown can
//! surface it; dropping an open target closes it silently.

pub mod block;
pub mod file;

pub use block::BlockTarget;
pub use file::FileTarget;

use crate::config::TargetKind;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::RawFd;
use std::path::Path;

/// Open flags for targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Bypass the page cache (O_DIRECT)
    pub direct: bool,

    /// Synchronized data writes (O_DSYNC)
    pub sync: bool,

    /// Create the file if it doesn't exist, truncating any old contents
    pub create: bool,

    /// Open for writing as well as reading
    pub write: bool,
}

impl OpenFlags {
    /// Custom flags passed to `open(2)` on top of the access mode
    pub fn custom_flags(&self) -> i32 {
        let mut flags = 0;
        if self.direct {
            flags |= libc::O_DIRECT;
        }
        if self.sync {
            flags |= libc::O_DSYNC;
        }
        flags
    }
}

/// Open descriptor plus the path it names
pub trait Target {
    fn fd(&self) -> RawFd;

    fn path(&self) -> &Path;

    /// Position the descriptor's file offset
    fn seek(&self, offset: u64) -> io::Result<()> {
        // SAFETY: lseek only requires a valid fd
        let result = unsafe { libc::lseek(self.fd(), offset as libc::off_t, libc::SEEK_SET) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Close the descriptor, reporting failure
    fn close(&mut self) -> io::Result<()>;
}

/// Close a raw descriptor that a target owns
pub(crate) fn close_fd(fd: &mut Option<RawFd>) -> io::Result<()> {
    if let Some(raw) = fd.take() {
        // SAFETY: the descriptor is owned and closed exactly once
        let result = unsafe { libc::close(raw) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Decide whether `path` names a block device or a file
///
/// A path that does not exist yet is a file target.
pub fn detect_kind(path: &Path) -> io::Result<TargetKind> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.file_type().is_block_device() => Ok(TargetKind::Device),
        Ok(_) => Ok(TargetKind::File),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(TargetKind::File),
        Err(e) => Err(e),
    }
}
