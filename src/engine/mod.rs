//! Transfer primitives
//!
//! A transfer primitive moves up to a requested number of bytes per call and
//! reports how many it actually moved. The transfer loop in [`transfer`]
//! drives a primitive until the whole byte count is done, so every benchmark
//! phase is one primitive plus one loop.
//!
//! # Primitives
//!
//! - **Read**: `read(2)` into an aligned buffer (`sync::FdReader`)
//! - **Write**: `write(2)` from an aligned buffer (`sync::FdWriter`)
//! - **Copy**: `sendfile(2)` between two descriptors (`sync::SendfileCopy`)
//! - **Page walk**: one byte per page across a shared mapping (`mmap::PageWalk`)
//!
//! All primitives use the descriptor's current file offset. Addressing is
//! sequential only.

pub mod mmap;
pub mod mock;
pub mod sync;
pub mod transfer;

use std::io;

pub use transfer::run;

/// Source or sink of one transfer phase
pub trait TransferPrimitive {
    /// Move up to `len` bytes
    ///
    /// Returns the number of bytes moved. `Ok(0)` means the primitive could
    /// make no progress (end of file or device). OS failures are returned as
    /// `io::Error` with the raw error code preserved.
    fn transfer(&mut self, len: usize) -> io::Result<usize>;
}

impl<T: TransferPrimitive + ?Sized> TransferPrimitive for &mut T {
    #[inline]
    fn transfer(&mut self, len: usize) -> io::Result<usize> {
        (**self).transfer(len)
    }
}
