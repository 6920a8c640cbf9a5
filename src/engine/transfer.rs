//! Transfer loop
//!
//! Moves exactly `total` bytes through a primitive in requests of at most
//! `request_size` bytes, accumulating partial completions. Runs inside the
//! timed interval: no logging, no allocation.

use super::TransferPrimitive;
use crate::error::TransferError;

/// Drive `primitive` until `total` bytes are transferred
///
/// Each iteration requests `min(request_size, total - completed)` bytes.
///
/// # Errors
///
/// - `TransferError::Io` if the primitive fails, carrying the OS error code
/// - `TransferError::UnexpectedEndOfStream` if it returns 0 while work is left
///
/// # Panics
///
/// Panics if `request_size` is 0.
#[inline]
pub fn run<P: TransferPrimitive + ?Sized>(
    primitive: &mut P,
    total: u64,
    request_size: usize,
) -> Result<u64, TransferError> {
    assert!(request_size > 0, "Request size must be greater than 0");

    let mut completed: u64 = 0;
    while completed < total {
        let request = (total - completed).min(request_size as u64) as usize;
        match primitive.transfer(request) {
            Ok(0) => return Err(TransferError::UnexpectedEndOfStream { completed, total }),
            Ok(n) => {
                debug_assert!(n <= request, "primitive moved more than requested");
                completed += n as u64;
            }
            Err(e) => return Err(TransferError::io(e)),
        }
    }

    Ok(completed)
}
