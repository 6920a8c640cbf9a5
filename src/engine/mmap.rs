//! Shared file mappings and the page walk
//!
//! The mapped benchmarks measure page-fault driven I/O: the file is mapped
//! `MAP_SHARED` read/write and the timed interval touches one byte in every
//! page, either storing a pattern byte or loading and discarding one. With
//! sync on, `msync(MS_SYNC)` flushes the dirty pages inside the interval.

use super::TransferPrimitive;
use crate::util::PAGE_SIZE;
use std::io;
use std::os::unix::io::RawFd;
use std::ptr;

/// Distance between touched bytes
pub const PAGE_WALK_STEP: usize = PAGE_SIZE;

/// Shared read/write mapping of a whole file
///
/// Unmapped on drop if [`MappedRegion::unmap`] was not called.
pub struct MappedRegion {
    addr: *mut u8,
    len: usize,
}

impl MappedRegion {
    /// Map the first `len` bytes of `fd`
    pub fn map(fd: RawFd, len: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }

        // SAFETY: a fresh mapping chosen by the kernel; fd validity is checked by mmap
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            addr: addr as *mut u8,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flush dirty pages synchronously
    pub fn sync(&self) -> io::Result<()> {
        // SAFETY: addr/len describe a live mapping owned by self
        let result = unsafe { libc::msync(self.addr as *mut libc::c_void, self.len, libc::MS_SYNC) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Unmap now and report failure
    pub fn unmap(mut self) -> io::Result<()> {
        self.release()
    }

    fn release(&mut self) -> io::Result<()> {
        if self.addr.is_null() {
            return Ok(());
        }
        // SAFETY: addr/len describe a live mapping owned by self
        let result = unsafe { libc::munmap(self.addr as *mut libc::c_void, self.len) };
        self.addr = ptr::null_mut();
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn walk_write(&mut self, pattern: u8) -> PageWalk<'_> {
        PageWalk {
            region: self,
            mode: WalkMode::Write(pattern),
            offset: 0,
        }
    }

    pub fn walk_read(&mut self) -> PageWalk<'_> {
        PageWalk {
            region: self,
            mode: WalkMode::Read,
            offset: 0,
        }
    }

    #[cfg(test)]
    fn byte_at(&self, offset: usize) -> u8 {
        assert!(offset < self.len);
        unsafe { ptr::read_volatile(self.addr.add(offset)) }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkMode {
    Write(u8),
    Read,
}

/// Touches one byte per page of a mapping
///
/// Each `transfer(len)` call covers the next `len` bytes of the region and
/// reports them as moved. Returns 0 once the end of the region is reached.
pub struct PageWalk<'a> {
    region: &'a mut MappedRegion,
    mode: WalkMode,
    offset: usize,
}

impl TransferPrimitive for PageWalk<'_> {
    #[inline(always)]
    fn transfer(&mut self, len: usize) -> io::Result<usize> {
        let end = self.offset.saturating_add(len).min(self.region.len);
        let moved = end - self.offset;

        let mut pos = self.offset;
        // SAFETY: pos < end <= region.len, inside the live mapping
        unsafe {
            match self.mode {
                WalkMode::Write(pattern) => {
                    while pos < end {
                        ptr::write_volatile(self.region.addr.add(pos), pattern);
                        pos += PAGE_WALK_STEP;
                    }
                }
                WalkMode::Read => {
                    while pos < end {
                        let _ = ptr::read_volatile(self.region.addr.add(pos));
                        pos += PAGE_WALK_STEP;
                    }
                }
            }
        }

        self.offset = end;
        Ok(moved)
    }
}
