//! Utilities shared by the engine, targets and report

pub mod buffer;
pub mod resource;

pub use buffer::{AlignedBuffer, PAGE_SIZE};
pub use resource::ResourceUsage;
