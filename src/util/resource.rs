//! Process resource usage
//!
//! A `getrusage(RUSAGE_SELF)` snapshot taken after the run completes. The
//! report prints it below the phase summaries. A failed query is fatal and
//! maps to exit code 2.

use serde::Serialize;
use std::io;

use crate::error::BenchError;
use crate::Result;

/// Resource usage snapshot for the current process
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ResourceUsage {
    /// User CPU time (seconds, microseconds)
    pub user_time: (i64, i64),
    /// System CPU time (seconds, microseconds)
    pub system_time: (i64, i64),
    /// Maximum resident set size in KB
    pub max_rss_kb: i64,
    pub shared_memory_kb: i64,
    pub unshared_data_kb: i64,
    pub unshared_stack_kb: i64,
    /// Page reclaims (soft page faults)
    pub minor_faults: i64,
    /// Page faults (hard page faults)
    pub major_faults: i64,
    pub swaps: i64,
    pub block_inputs: i64,
    pub block_outputs: i64,
    pub messages_sent: i64,
    pub messages_received: i64,
    pub signals: i64,
    pub voluntary_switches: i64,
    pub involuntary_switches: i64,
}

impl ResourceUsage {
    /// Query resource usage for this process
    pub fn take() -> Result<Self> {
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };

        // SAFETY: usage is a valid, writable rusage struct
        let ret = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
        if ret != 0 {
            return Err(BenchError::ResourceUsage(io::Error::last_os_error()));
        }

        Ok(Self::from_raw(&usage))
    }

    fn from_raw(usage: &libc::rusage) -> Self {
        Self {
            user_time: (usage.ru_utime.tv_sec as i64, usage.ru_utime.tv_usec as i64),
            system_time: (usage.ru_stime.tv_sec as i64, usage.ru_stime.tv_usec as i64),
            max_rss_kb: usage.ru_maxrss as i64,
            shared_memory_kb: usage.ru_ixrss as i64,
            unshared_data_kb: usage.ru_idrss as i64,
            unshared_stack_kb: usage.ru_isrss as i64,
            minor_faults: usage.ru_minflt as i64,
            major_faults: usage.ru_majflt as i64,
            swaps: usage.ru_nswap as i64,
            block_inputs: usage.ru_inblock as i64,
            block_outputs: usage.ru_oublock as i64,
            messages_sent: usage.ru_msgsnd as i64,
            messages_received: usage.ru_msgrcv as i64,
            signals: usage.ru_nsignals as i64,
            voluntary_switches: usage.ru_nvcsw as i64,
            involuntary_switches: usage.ru_nivcsw as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_snapshot() {
        let usage = ResourceUsage::take().unwrap();
        assert!(usage.max_rss_kb > 0);
        assert!(usage.user_time.1 < 1_000_000);
        assert!(usage.system_time.1 < 1_000_000);
    }
}
