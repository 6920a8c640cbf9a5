//! storbench - sequential storage throughput benchmark
//!
//! storbench measures raw sequential throughput (MBPS) and CPU utilization of
//! block devices and files. Every benchmark runs the same measured sequence
//! per repeat:
//!
//! ```text
//! Setup -> Delay -> TimerStart -> Transfer(+Flush) -> TimerStop -> Rate -> Record -> Teardown
//! ```
//!
//! # Architecture
//!
//! - **Buffers**: page-aligned transfer buffers usable with O_DIRECT (`util::buffer`)
//! - **Timing**: realtime, monotonic, process-CPU and thread-CPU clocks sampled together (`timer`)
//! - **Transfer primitives**: read, write, sendfile copy and mapped page walk (`engine`)
//! - **Statistics**: MBPS and utilization per repeat, median/average/min/max per phase (`stats`)
//! - **Orchestration**: per-operation phase plans and the repeat loop (`orchestrator`)

pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod stats;
pub mod target;
pub mod timer;
pub mod util;

// Re-export commonly used types
pub use config::RunConfig;
pub use error::BenchError;
pub use orchestrator::Orchestrator;

/// Result type used throughout storbench
pub type Result<T> = std::result::Result<T, BenchError>;
