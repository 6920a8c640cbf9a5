//! Error taxonomy
//!
//! Every failure on the measured path maps to one `BenchError` variant. The
//! variants carry the operation, the resource and the underlying OS error so
//! that the message printed at exit is self-explanatory. `exit_code()` maps
//! the taxonomy onto the process exit codes.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::stats::Phase;

/// Failure inside the transfer loop
#[derive(Debug, Error)]
pub enum TransferError {
    /// The primitive returned an error
    #[error("{source}")]
    Io {
        /// Raw OS error code, if the error came from the OS
        code: Option<i32>,
        #[source]
        source: io::Error,
    },

    /// The primitive returned 0 bytes while work was outstanding
    #[error("unexpected zero length transfer after {completed} of {total} bytes")]
    UnexpectedEndOfStream { completed: u64, total: u64 },
}

impl TransferError {
    /// Wrap an OS error, keeping its raw code
    pub fn io(source: io::Error) -> Self {
        Self::Io {
            code: source.raw_os_error(),
            source,
        }
    }
}

/// Statistics-layer failure
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StatsError {
    #[error("no samples to summarize")]
    EmptySampleSet,

    #[error("wall-clock interval is invalid or not positive")]
    Indeterminate,
}

/// Errors produced by the benchmark core
#[derive(Debug, Error)]
pub enum BenchError {
    /// Invalid, out-of-range or unsupported option value
    #[error("BAD PARAMETER: {0}")]
    Configuration(String),

    #[error("memory allocation failed: {size} bytes aligned to {alignment}")]
    Allocation { size: usize, alignment: usize },

    /// Device or file could not be created or opened
    #[error("{operation} error: {} ({source})", .path.display())]
    Open {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file mapping error: {} ({source})", .path.display())]
    Mapping {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{operation} error: {} ({source})", .path.display())]
    Transfer {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: TransferError,
    },

    #[error("file flush error: {} ({source})", .path.display())]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Unmap, close or delete failure. Reported, never fatal on its own.
    #[error("{operation} error: {} ({source})", .path.display())]
    Teardown {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{phase} statistics unavailable: no samples were recorded")]
    EmptySampleSet { phase: Phase },

    #[error("{phase} pass {repeat}: rate is indeterminate (wall-clock interval invalid or not positive)")]
    Indeterminate { phase: Phase, repeat: u32 },

    #[error("get resource usage failed ({0})")]
    ResourceUsage(#[source] io::Error),

    #[error("test skipped")]
    Declined,
}

impl BenchError {
    /// Process exit code for this error
    ///
    /// 1 = configuration, 2 = resource usage query, 3 = runtime failure or
    /// declined prompt.
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::Configuration(_) => 1,
            BenchError::ResourceUsage(_) => 2,
            _ => 3,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        BenchError::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(BenchError::config("x").exit_code(), 1);
        assert_eq!(
            BenchError::ResourceUsage(io::Error::from_raw_os_error(libc::EFAULT)).exit_code(),
            2
        );
        assert_eq!(BenchError::Declined.exit_code(), 3);
        assert_eq!(
            BenchError::EmptySampleSet { phase: Phase::Read }.exit_code(),
            3
        );
    }

    #[test]
    fn test_transfer_error_keeps_os_code() {
        let err = TransferError::io(io::Error::from_raw_os_error(libc::EIO));
        match err {
            TransferError::Io { code, .. } => assert_eq!(code, Some(libc::EIO)),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_message_names_resource_and_os_error() {
        let err = BenchError::Open {
            operation: "file create",
            path: PathBuf::from("/tmp/x.bin"),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        let msg = err.to_string();
        assert!(msg.contains("file create"));
        assert!(msg.contains("/tmp/x.bin"));
        assert!(msg.contains("No such file"));
    }
}
