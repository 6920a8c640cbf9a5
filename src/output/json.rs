//! JSON output formatting
//!
//! The JSON report carries everything the console report shows: the resolved
//! configuration, clock resolutions, every measurement, per-phase summaries,
//! teardown warnings and the process resource usage.

use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::config::RunConfig;
use crate::orchestrator::RunReport;
use crate::stats::{MeasurementResult, PhaseSummary};
use crate::timer::{ClockId, ClockSource, MultiClockTimer};
use crate::util::ResourceUsage;

/// One clock and its resolution
#[derive(Debug, Clone, Serialize)]
pub struct JsonClock {
    pub name: &'static str,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_ns: Option<f64>,
}

/// Top-level JSON report
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub tool: &'static str,
    pub version: &'static str,
    /// RFC 3339 time the report was built
    pub timestamp: String,
    pub config: RunConfig,
    pub clocks: Vec<JsonClock>,
    pub results: Vec<MeasurementResult>,
    pub summaries: Vec<PhaseSummary>,
    pub teardown_warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_usage: Option<ResourceUsage>,
}

/// Clock listing for the report
pub fn clocks<C: ClockSource>(timer: &MultiClockTimer<C>) -> Vec<JsonClock> {
    ClockId::ALL
        .iter()
        .map(|&clock| {
            let resolution = timer.resolution(clock);
            JsonClock {
                name: clock.name(),
                available: resolution.available,
                resolution_ns: resolution
                    .available
                    .then(|| resolution.seconds * 1e9 + resolution.nanoseconds),
            }
        })
        .collect()
}

pub fn build_report<C: ClockSource>(
    config: &RunConfig,
    timer: &MultiClockTimer<C>,
    report: &RunReport,
    resource_usage: Option<ResourceUsage>,
) -> JsonReport {
    JsonReport {
        tool: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        config: config.clone(),
        clocks: clocks(timer),
        results: report.results.clone(),
        summaries: report.summaries.clone(),
        teardown_warnings: report.teardown_warnings.clone(),
        resource_usage,
    }
}

/// Write the report as pretty-printed JSON
pub fn write_json_report(path: &Path, report: &JsonReport) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create JSON report: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write JSON report: {}", path.display()))?;
    Ok(())
}
