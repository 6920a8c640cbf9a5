//! Block device target implementation
//!
//! Raw block devices are read in place: nothing is created, written or
//! deleted. The device is opened read-only, with O_DIRECT when direct I/O is
//! on, and its size comes from the `BLKGETSIZE64` ioctl.
//!
//! # Requirements
//!
//! - Root or appropriate permissions to access block devices
//! - Buffer, offset and request length aligned to the sector size under O_DIRECT
//!
//! # Example
//!
//! ```no_run
//! use storbench::target::{BlockTarget, OpenFlags, Target};
//! use std::path::Path;
//!
//! // Note: Requires root permissions
//! let mut target = BlockTarget::open(Path::new("/dev/sdb"), OpenFlags { direct: true, ..Default::default() }).unwrap();
//! let size = target.size();
//! target.seek(0).unwrap();
//! target.close().unwrap();
//! ```

use super::{close_fd, OpenFlags, Target};
use crate::error::BenchError;
use crate::Result;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};

// ioctl request code for getting block device size
const BLKGETSIZE64: libc::c_ulong = 0x80081272;

/// Block device opened for reading
#[derive(Debug)]
pub struct BlockTarget {
    path: PathBuf,
    fd: Option<RawFd>,
    device_size: u64,
}

impl BlockTarget {
    /// Open a device read-only
    ///
    /// Only `flags.direct` applies. Block devices can't be created or written
    /// by the benchmark, so `create`, `write` and `sync` are ignored.
    pub fn open(path: &Path, flags: OpenFlags) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        if flags.direct {
            options.custom_flags(libc::O_DIRECT);
        }

        let file = options.open(path).map_err(|source| BenchError::Open {
            operation: "device open",
            path: path.to_path_buf(),
            source,
        })?;

        let device_size = ioctl_size(file.as_raw_fd()).map_err(|source| BenchError::Open {
            operation: "device size query",
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            fd: Some(file.into_raw_fd()),
            device_size,
        })
    }

    /// Device size in bytes
    pub fn size(&self) -> u64 {
        self.device_size
    }
}

impl Target for BlockTarget {
    fn fd(&self) -> RawFd {
        self.fd.unwrap_or(-1)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn close(&mut self) -> io::Result<()> {
        close_fd(&mut self.fd)
    }
}

impl Drop for BlockTarget {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Size of the block device at `path`
///
/// Used by configuration validation before any benchmark I/O.
pub fn device_size(path: &Path) -> io::Result<u64> {
    let file = OpenOptions::new().read(true).open(path)?;
    ioctl_size(file.as_raw_fd())
}

fn ioctl_size(fd: RawFd) -> io::Result<u64> {
    let mut size: u64 = 0;
    // SAFETY: BLKGETSIZE64 writes one u64 through the pointer
    let result = unsafe { libc::ioctl(fd, BLKGETSIZE64 as _, &mut size) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(size)
}
