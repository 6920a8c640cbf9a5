//! Mock transfer primitive for testing
//!
//! Replays a script of per-call outcomes without touching the OS, and records
//! every requested length so tests can check how the transfer loop split the
//! work.
//!
//! # Example
//!
//! ```
//! use storbench::engine::mock::{MockPrimitive, MockStep};
//! use storbench::engine::run;
//!
//! let mut primitive = MockPrimitive::with_script(vec![MockStep::Bytes(512)]);
//! let done = run(&mut primitive, 4096, 4096).unwrap();
//! assert_eq!(done, 4096);
//! assert_eq!(primitive.requests(), vec![4096, 3584]);
//! ```

use super::TransferPrimitive;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// Outcome of one scripted call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStep {
    /// Move everything requested
    Full,
    /// Move at most this many bytes
    Bytes(usize),
    /// Return 0
    Zero,
    /// Fail with this raw OS error code
    Error(i32),
}

/// Scripted transfer primitive
///
/// Once the script is exhausted every call completes in full.
#[derive(Debug, Default, Clone)]
pub struct MockPrimitive {
    script: VecDeque<MockStep>,
    requests: Vec<usize>,
    latency: Option<Duration>,
}

impl MockPrimitive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<MockStep>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    /// Sleep for `latency` on every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.len()
    }

    /// Requested lengths, in call order
    pub fn requests(&self) -> Vec<usize> {
        self.requests.clone()
    }
}

impl TransferPrimitive for MockPrimitive {
    fn transfer(&mut self, len: usize) -> io::Result<usize> {
        self.requests.push(len);
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        match self.script.pop_front().unwrap_or(MockStep::Full) {
            MockStep::Full => Ok(len),
            MockStep::Bytes(n) => Ok(n.min(len)),
            MockStep::Zero => Ok(0),
            MockStep::Error(code) => Err(io::Error::from_raw_os_error(code)),
        }
    }
}
