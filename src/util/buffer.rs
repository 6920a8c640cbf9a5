//! Page-aligned transfer buffer
//!
//! O_DIRECT transfers need the user buffer aligned to the device's logical
//! block size. The benchmarks align to the page size, which satisfies every
//! device we care about. Buffers are allocated and filled outside the timed
//! interval so page-fault cost is not charged to the transfer rate.

use std::alloc::{alloc, dealloc, Layout};
use std::ptr;

use crate::error::BenchError;
use crate::Result;

/// Page size used for buffer alignment and the mapped-region page walk
pub const PAGE_SIZE: usize = 4096;

/// Memory-aligned buffer suitable for O_DIRECT operations
pub struct AlignedBuffer {
    ptr: *mut u8,
    size: usize,
    alignment: usize,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate a buffer of `size` bytes aligned to `alignment`
    ///
    /// # Errors
    /// Returns `BenchError::Allocation` if the allocator cannot satisfy the
    /// request.
    ///
    /// # Panics
    /// Panics if alignment is not a power of 2 or size is 0. Both are
    /// programming errors, not runtime conditions.
    pub fn allocate(size: usize, alignment: usize) -> Result<Self> {
        assert!(alignment.is_power_of_two(), "Alignment must be a power of 2");
        assert!(size > 0, "Buffer size must be greater than 0");

        let layout = Layout::from_size_align(size, alignment)
            .map_err(|_| BenchError::Allocation { size, alignment })?;

        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc(layout) };
        if ptr.is_null() {
            return Err(BenchError::Allocation { size, alignment });
        }

        Ok(AlignedBuffer {
            ptr,
            size,
            alignment,
            layout,
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr
    }

    /// Contents, for checking what a read or fill left behind
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is a live allocation of `size` bytes owned by self
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Fill the whole buffer with one byte value
    ///
    /// Touches every page, so call it before the timed interval starts.
    pub fn fill(&mut self, pattern: u8) {
        unsafe { ptr::write_bytes(self.ptr, pattern, self.size) };
    }

    /// Release the buffer now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.ptr, self.layout);
        }
    }
}

// SAFETY: the allocation is uniquely owned
unsafe impl Send for AlignedBuffer {}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .finish()
    }
}
