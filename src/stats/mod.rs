//! Statistics collection
//!
//! Per-repeat measurement records and the per-phase summaries derived from them.
//!
//! Every repeat of a phase produces one `MeasurementResult`, or one per zone
//! when a read is profiled across its range. The aggregator keeps
//! an ordered, growable sequence of results per phase and recomputes the summary
//! (median, average, minimum, maximum) from the full sequence whenever it is
//! requested, so the running statistics printed after each repeat and the final
//! summary block always agree.
//!
//! # Example
//!
//! ```
//! use storbench::stats::{MeasurementResult, Phase, StatisticsAggregator};
//!
//! let mut stats = StatisticsAggregator::new();
//! stats.append(MeasurementResult::new(Phase::Read, 0, 1 << 30, 512.0, Some(0.05)));
//! stats.append(MeasurementResult::new(Phase::Read, 1, 1 << 30, 530.0, Some(0.04)));
//!
//! let summary = stats.summarize(Phase::Read).unwrap();
//! assert_eq!(summary.mbps.median, 521.0);
//! ```

pub mod rate;

pub use rate::Rate;

use serde::Serialize;
use std::fmt;

use crate::error::{BenchError, StatsError};

/// Measured phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Write,
    Read,
    Copy,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Write => "write",
            Phase::Read => "read",
            Phase::Copy => "copy",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one timed transfer: a whole repeat, or one zone of it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeasurementResult {
    pub phase: Phase,
    pub repeat_index: u32,
    pub bytes_transferred: u64,
    pub mbps: f64,
    /// Process CPU time over wall time; `None` if the CPU clock interval was invalid
    pub cpu_utilization: Option<f64>,
    /// Start offset of the zone when a read is profiled zone by zone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl MeasurementResult {
    pub fn new(
        phase: Phase,
        repeat_index: u32,
        bytes_transferred: u64,
        mbps: f64,
        cpu_utilization: Option<f64>,
    ) -> Self {
        Self {
            phase,
            repeat_index,
            bytes_transferred,
            mbps,
            cpu_utilization,
            offset: None,
        }
    }

    /// Build a result from a computed rate
    pub fn from_rate(phase: Phase, repeat_index: u32, bytes_transferred: u64, rate: Rate) -> Self {
        Self::new(phase, repeat_index, bytes_transferred, rate.mbps, rate.utilization)
    }

    pub fn at_offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }
}

/// Median, average, minimum and maximum of a sample sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub median: f64,
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

/// Summarize a non-empty sample sequence
///
/// The median sorts a copy of the samples: the middle value for odd lengths,
/// the mean of the two middle values for even lengths. No outlier rejection.
///
/// # Errors
///
/// `StatsError::EmptySampleSet` if `samples` is empty.
pub fn summarize(samples: &[f64]) -> Result<StatisticsSummary, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::EmptySampleSet);
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };

    let minimum = sorted[0];
    let maximum = sorted[n - 1];
    // Rounding in the sum can push the mean just past the extremes
    let average = (samples.iter().sum::<f64>() / n as f64).max(minimum).min(maximum);

    Ok(StatisticsSummary {
        median,
        average,
        minimum,
        maximum,
    })
}

/// Summary of one phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub samples: usize,
    pub mbps: StatisticsSummary,
    /// Over the repeats with a valid CPU interval; `None` if there were none
    pub utilization: Option<StatisticsSummary>,
}

/// Ordered per-phase result sequences
#[derive(Debug, Default, Clone)]
pub struct StatisticsAggregator {
    phases: Vec<(Phase, Vec<MeasurementResult>)>,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result to its phase's sequence
    pub fn append(&mut self, result: MeasurementResult) {
        match self.phases.iter_mut().find(|(p, _)| *p == result.phase) {
            Some((_, results)) => results.push(result),
            None => self.phases.push((result.phase, vec![result])),
        }
    }

    /// Results recorded for `phase`, in repeat order
    pub fn results(&self, phase: Phase) -> &[MeasurementResult] {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, results)| results.as_slice())
            .unwrap_or(&[])
    }

    /// Phases in the order their first result arrived
    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases.iter().map(|(p, _)| *p)
    }

    pub fn mbps_samples(&self, phase: Phase) -> Vec<f64> {
        self.results(phase).iter().map(|r| r.mbps).collect()
    }

    pub fn utilization_samples(&self, phase: Phase) -> Vec<f64> {
        self.results(phase)
            .iter()
            .filter_map(|r| r.cpu_utilization)
            .collect()
    }

    /// Summarize everything recorded so far for `phase`
    pub fn summarize(&self, phase: Phase) -> crate::Result<PhaseSummary> {
        let mbps = summarize(&self.mbps_samples(phase))
            .map_err(|_| BenchError::EmptySampleSet { phase })?;
        let utilization = summarize(&self.utilization_samples(phase)).ok();

        Ok(PhaseSummary {
            phase,
            samples: self.results(phase).len(),
            mbps,
            utilization,
        })
    }

    /// All recorded results across phases
    pub fn all_results(&self) -> Vec<MeasurementResult> {
        self.phases
            .iter()
            .flat_map(|(_, results)| results.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_sample() {
        let s = summarize(&[5.0]).unwrap();
        assert_eq!(s.median, 5.0);
        assert_eq!(s.average, 5.0);
        assert_eq!(s.minimum, 5.0);
        assert_eq!(s.maximum, 5.0);
    }

    #[test]
    fn test_even_median() {
        let s = summarize(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.median, 2.5);
        assert_eq!(s.average, 2.5);
    }

    #[test]
    fn test_odd_median_unsorted() {
        let s = summarize(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!(s.median, 2.0);
        assert_eq!(s.minimum, 1.0);
        assert_eq!(s.maximum, 3.0);
    }

    #[test]
    fn test_average_of_equal_samples_is_exact() {
        let s = summarize(&[0.1, 0.1, 0.1]).unwrap();
        assert_eq!(s.average, 0.1);
        assert_eq!(s.minimum, 0.1);
        assert_eq!(s.maximum, 0.1);
    }

    #[test]
    fn test_empty_sample_set() {
        assert_eq!(summarize(&[]), Err(StatsError::EmptySampleSet));
    }

    #[test]
    fn test_summary_bounds() {
        let sets: [&[f64]; 7] = [
            &[0.5],
            &[0.1, 0.1, 0.1],
            &[0.7, 0.7, 0.7, 0.7, 0.7, 0.7, 0.7],
            &[10.0, 1.0],
            &[7.0, 7.0, 7.0, 7.0],
            &[100.0, 0.001, 55.5, 3.25, 800.0],
            &[1.0e-9, 2.0e9, 3.0, 4.0, 5.0, 6.0],
        ];
        for samples in sets {
            let s = summarize(samples).unwrap();
            assert!(s.minimum <= s.median && s.median <= s.maximum, "{:?}", samples);
            assert!(s.minimum <= s.average && s.average <= s.maximum, "{:?}", samples);
        }
    }

    #[test]
    fn test_summarize_does_not_reorder_input() {
        let samples = vec![3.0, 1.0, 2.0];
        summarize(&samples).unwrap();
        assert_eq!(samples, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_aggregator_keeps_phases_apart() {
        let mut stats = StatisticsAggregator::new();
        stats.append(MeasurementResult::new(Phase::Write, 0, 4096, 100.0, Some(0.5)));
        stats.append(MeasurementResult::new(Phase::Write, 1, 4096, 200.0, None));
        stats.append(MeasurementResult::new(Phase::Read, 0, 4096, 50.0, Some(0.1)));

        assert_eq!(stats.results(Phase::Write).len(), 2);
        assert_eq!(stats.results(Phase::Read).len(), 1);
        assert!(stats.results(Phase::Copy).is_empty());
        assert_eq!(stats.phases().collect::<Vec<_>>(), vec![Phase::Write, Phase::Read]);

        let write = stats.summarize(Phase::Write).unwrap();
        assert_eq!(write.samples, 2);
        assert_eq!(write.mbps.average, 150.0);
        // Only the repeat with a valid CPU interval contributes
        assert_eq!(write.utilization.unwrap().average, 0.5);
    }

    #[test]
    fn test_aggregator_empty_phase() {
        let stats = StatisticsAggregator::new();
        match stats.summarize(Phase::Copy) {
            Err(BenchError::EmptySampleSet { phase }) => assert_eq!(phase, Phase::Copy),
            other => panic!("Expected EmptySampleSet, got {:?}", other),
        }
    }

    #[test]
    fn test_utilization_none_when_never_valid() {
        let mut stats = StatisticsAggregator::new();
        stats.append(MeasurementResult::new(Phase::Read, 0, 4096, 10.0, None));
        let summary = stats.summarize(Phase::Read).unwrap();
        assert!(summary.utilization.is_none());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Write.to_string(), "write");
        assert_eq!(Phase::Copy.to_string(), "copy");
    }
}
