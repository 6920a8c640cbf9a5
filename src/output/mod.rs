//! Report output
//!
//! - **text**: console report and the [`text::ConsoleSink`] result sink
//! - **json**: machine-readable run report written with `--json`

pub mod json;
pub mod text;

pub use json::{build_report, write_json_report, JsonReport};
pub use text::{format_size, ConsoleSink};
