//! Synchronous descriptor primitives
//!
//! Blocking `read(2)`, `write(2)` and `sendfile(2)` against the descriptor's
//! current file offset. With O_DIRECT the buffer address, the request length
//! and the file offset must all be sector aligned; the buffers come from
//! [`AlignedBuffer`] and the configuration validator checks the rest.
//!
//! # Example
//!
//! ```no_run
//! use storbench::engine::run;
//! use storbench::engine::sync::FdReader;
//! use storbench::util::{AlignedBuffer, PAGE_SIZE};
//! use std::os::unix::io::AsRawFd;
//!
//! let file = std::fs::File::open("/dev/sda").unwrap();
//! let mut buffer = AlignedBuffer::allocate(1024 * 1024, PAGE_SIZE).unwrap();
//! let mut reader = FdReader::new(file.as_raw_fd(), &mut buffer);
//! let bytes = run(&mut reader, 16 * 1024 * 1024, 1024 * 1024).unwrap();
//! ```

use super::TransferPrimitive;
use crate::util::AlignedBuffer;
use std::io;
use std::os::unix::io::RawFd;

/// Reads from a descriptor into the start of an aligned buffer
///
/// The data is overwritten on every call; only the byte count matters.
pub struct FdReader<'a> {
    fd: RawFd,
    buffer: &'a mut AlignedBuffer,
}

impl<'a> FdReader<'a> {
    pub fn new(fd: RawFd, buffer: &'a mut AlignedBuffer) -> Self {
        Self { fd, buffer }
    }
}

impl TransferPrimitive for FdReader<'_> {
    #[inline(always)]
    fn transfer(&mut self, len: usize) -> io::Result<usize> {
        let len = len.min(self.buffer.size());

        // SAFETY: the buffer is valid for `len` bytes and exclusively borrowed
        let result = unsafe {
            libc::read(self.fd, self.buffer.as_mut_ptr() as *mut libc::c_void, len)
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(result as usize)
    }
}

/// Writes the start of an aligned buffer to a descriptor
pub struct FdWriter<'a> {
    fd: RawFd,
    buffer: &'a AlignedBuffer,
}

impl<'a> FdWriter<'a> {
    pub fn new(fd: RawFd, buffer: &'a AlignedBuffer) -> Self {
        Self { fd, buffer }
    }
}

impl TransferPrimitive for FdWriter<'_> {
    #[inline(always)]
    fn transfer(&mut self, len: usize) -> io::Result<usize> {
        let len = len.min(self.buffer.size());

        // SAFETY: the buffer is valid for `len` bytes
        let result = unsafe {
            libc::write(self.fd, self.buffer.as_ptr() as *const libc::c_void, len)
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(result as usize)
    }
}

/// Kernel-side copy from one descriptor to another
pub struct SendfileCopy {
    out_fd: RawFd,
    in_fd: RawFd,
}

impl SendfileCopy {
    pub fn new(out_fd: RawFd, in_fd: RawFd) -> Self {
        Self { out_fd, in_fd }
    }
}

impl TransferPrimitive for SendfileCopy {
    #[inline(always)]
    fn transfer(&mut self, len: usize) -> io::Result<usize> {
        // SAFETY: a null offset pointer makes sendfile use and advance in_fd's offset
        let result = unsafe { libc::sendfile(self.out_fd, self.in_fd, std::ptr::null_mut(), len) };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(result as usize)
    }
}

/// Synchronize a descriptor's data and metadata to storage
pub fn fsync(fd: RawFd) -> io::Result<()> {
    // SAFETY: fsync is a simple syscall that only requires a valid fd
    let result = unsafe { libc::fsync(fd) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::run;
    use crate::util::PAGE_SIZE;
    use std::fs::{File, OpenOptions};
    use std::io::{Seek, SeekFrom};
    use std::os::unix::io::AsRawFd;
    use tempfile::TempDir;

    #[test]
    fn test_fd_writer_then_reader() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test_write.dat");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&file_path)
            .unwrap();

        let mut buffer = AlignedBuffer::allocate(8192, PAGE_SIZE).unwrap();
        buffer.fill(b'x');
        let mut writer = FdWriter::new(file.as_raw_fd(), &buffer);
        assert_eq!(run(&mut writer, 20_000, 8192).unwrap(), 20_000);
        fsync(file.as_raw_fd()).unwrap();

        assert_eq!(std::fs::metadata(&file_path).unwrap().len(), 20_000);

        let mut file = file;
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut buffer = AlignedBuffer::allocate(8192, PAGE_SIZE).unwrap();
        let mut reader = FdReader::new(file.as_raw_fd(), &mut buffer);
        assert_eq!(run(&mut reader, 20_000, 8192).unwrap(), 20_000);
        assert!(buffer.as_slice()[..100].iter().all(|&b| b == b'x'));
    }

    #[test]
    fn test_fd_reader_short_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("short.dat");
        std::fs::write(&file_path, vec![1u8; 5000]).unwrap();

        let file = File::open(&file_path).unwrap();
        let mut buffer = AlignedBuffer::allocate(4096, PAGE_SIZE).unwrap();
        let mut reader = FdReader::new(file.as_raw_fd(), &mut buffer);

        match run(&mut reader, 8192, 4096) {
            Err(crate::error::TransferError::UnexpectedEndOfStream { completed, .. }) => {
                assert_eq!(completed, 5000)
            }
            other => panic!("Expected UnexpectedEndOfStream, got {:?}", other),
        }
    }

    #[test]
    fn test_sendfile_copy() {
        let temp_dir = TempDir::new().unwrap();
        let src_path = temp_dir.path().join("src.dat");
        let dst_path = temp_dir.path().join("dst.dat");
        let data: Vec<u8> = (0..30_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&src_path, &data).unwrap();

        let src = File::open(&src_path).unwrap();
        let dst = File::create(&dst_path).unwrap();
        let mut copy = SendfileCopy::new(dst.as_raw_fd(), src.as_raw_fd());
        assert_eq!(run(&mut copy, 30_000, 4096).unwrap(), 30_000);
        drop(dst);

        assert_eq!(std::fs::read(&dst_path).unwrap(), data);
    }

    #[test]
    fn test_invalid_fd() {
        let mut buffer = AlignedBuffer::allocate(4096, PAGE_SIZE).unwrap();
        let mut reader = FdReader::new(-1, &mut buffer);
        let err = reader.transfer(4096).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert!(fsync(-1).is_err());
    }
}
