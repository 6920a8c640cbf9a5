//! File target implementation
//!
//! Temp files for the write, read, copy and mapped benchmarks. A file is
//! either created fresh (write phases) or prepared with pattern data ahead of
//! the timed interval (read, copy source and mapped phases), then removed in
//! teardown.
//!
//! # Example
//!
//! ```no_run
//! use storbench::target::{FileTarget, OpenFlags, Target};
//! use std::path::Path;
//!
//! let path = Path::new("/tmp/storbench.bin");
//! FileTarget::prepare(path, 64 * 1024 * 1024, b'0', OpenFlags::default()).unwrap();
//!
//! let mut target = FileTarget::open(path, OpenFlags { direct: true, ..Default::default() }).unwrap();
//! target.seek(0).unwrap();
//! target.close().unwrap();
//! FileTarget::remove(path).unwrap();
//! ```

use super::{close_fd, OpenFlags, Target};
use crate::engine::run;
use crate::engine::sync::{fsync, FdWriter};
use crate::error::BenchError;
use crate::util::{AlignedBuffer, PAGE_SIZE};
use crate::Result;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{IntoRawFd, RawFd};
use std::path::{Path, PathBuf};

/// Chunk size used to fill prepared files
pub const PREPARE_CHUNK: usize = 1024 * 1024;

/// Regular file opened for a benchmark phase
#[derive(Debug)]
pub struct FileTarget {
    path: PathBuf,
    fd: Option<RawFd>,
}

impl FileTarget {
    /// Create (or truncate) a file for writing
    pub fn create(path: &Path, flags: OpenFlags) -> Result<Self> {
        Self::open_with(
            path,
            OpenFlags {
                create: true,
                write: true,
                ..flags
            },
            "file create",
        )
    }

    /// Open an existing file
    pub fn open(path: &Path, flags: OpenFlags) -> Result<Self> {
        Self::open_with(path, flags, "file open")
    }

    fn open_with(path: &Path, flags: OpenFlags, operation: &'static str) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        if flags.write {
            options.write(true);
        }
        if flags.create {
            options.create(true).truncate(true);
        }

        let custom_flags = flags.custom_flags();
        if custom_flags != 0 {
            options.custom_flags(custom_flags);
        }

        let file = options.open(path).map_err(|source| BenchError::Open {
            operation,
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            fd: Some(file.into_raw_fd()),
        })
    }

    /// Create `path` holding `size` bytes of `pattern`
    ///
    /// Runs outside the timed interval. The file is written with `flags`
    /// so an O_DIRECT run prepares its data the same way it will read it.
    pub fn prepare(path: &Path, size: u64, pattern: u8, flags: OpenFlags) -> Result<()> {
        let mut target = Self::create(path, flags)?;

        let chunk = PREPARE_CHUNK.min(size.max(1) as usize).next_multiple_of(PAGE_SIZE);
        let mut buffer = AlignedBuffer::allocate(chunk, PAGE_SIZE)?;
        buffer.fill(pattern);

        let mut writer = FdWriter::new(target.fd(), &buffer);
        run(&mut writer, size, chunk).map_err(|source| BenchError::Transfer {
            operation: "file write",
            path: path.to_path_buf(),
            source,
        })?;
        buffer.release();

        target.close().map_err(|source| BenchError::Open {
            operation: "file close",
            path: path.to_path_buf(),
            source,
        })
    }

    /// Flush data and metadata to storage
    pub fn sync(&self) -> Result<()> {
        fsync(self.fd()).map_err(|source| BenchError::Flush {
            path: self.path.clone(),
            source,
        })
    }

    /// Delete a temp file
    pub fn remove(path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

impl Target for FileTarget {
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

impl Drop for FileTarget {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_target_create() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test_create.dat");

        let mut target = FileTarget::create(&file_path, OpenFlags::default()).unwrap();
        assert!(target.fd() >= 0);
        assert_eq!(target.path(), file_path.as_path());
        assert!(file_path.exists());
        target.close().unwrap();
        assert_eq!(target.fd(), -1);

        // Second close is a no-op
        target.close().unwrap();
    }

    #[test]
    fn test_file_target_open_missing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("missing.dat");

        match FileTarget::open(&file_path, OpenFlags::default()) {
            Err(BenchError::Open { operation, path, source }) => {
                assert_eq!(operation, "file open");
                assert_eq!(path, file_path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("Expected open error, got {:?}", other),
        }
    }

    #[test]
    fn test_file_target_prepare() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("prepared.dat");

        FileTarget::prepare(&file_path, 3 * PREPARE_CHUNK as u64 + 4096, b'0', OpenFlags::default())
            .unwrap();

        let contents = std::fs::read(&file_path).unwrap();
        assert_eq!(contents.len(), 3 * PREPARE_CHUNK + 4096);
        assert!(contents.iter().all(|&b| b == b'0'));
    }

    #[test]
    fn test_file_target_prepare_small() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("small.dat");

        FileTarget::prepare(&file_path, 100, 7, OpenFlags::default()).unwrap();
        assert_eq!(std::fs::read(&file_path).unwrap(), vec![7u8; 100]);
    }

    #[test]
    fn test_file_target_seek_and_sync() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("seek.dat");
        FileTarget::prepare(&file_path, 8192, 1, OpenFlags::default()).unwrap();

        let target = FileTarget::open(
            &file_path,
            OpenFlags {
                write: true,
                ..Default::default()
            },
        )
        .unwrap();
        target.seek(4096).unwrap();
        target.sync().unwrap();

        let pos = unsafe { libc::lseek(target.fd(), 0, libc::SEEK_CUR) };
        assert_eq!(pos, 4096);
    }

    #[test]
    fn test_file_target_remove() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("remove.dat");
        std::fs::write(&file_path, b"x").unwrap();

        FileTarget::remove(&file_path).unwrap();
        assert!(!file_path.exists());
        assert!(FileTarget::remove(&file_path).is_err());
    }
}
