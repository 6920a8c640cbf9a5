//! Benchmark orchestration
//!
//! The orchestrator owns the timer and the statistics for one run and drives
//! every phase plan through the same per-repeat sequence:
//!
//! ```text
//! Setup -> Delay -> TimerStart -> Transfer(+Flush) -> TimerStop -> Rate -> Record -> Teardown
//! ```
//!
//! A profiled read repeats TimerStart through Record once per zone before the
//! single teardown. Only the transfer (and the flush, when sync is on) lies
//! inside the timed interval. Logging happens before the timer starts or after it stops.
//! Teardown runs after every successful setup, including when the transfer
//! or the rate computation failed. Teardown failures are collected into the
//! report and never change the outcome.

pub mod mock;
pub mod plan;

use serde::Serialize;
use std::thread;

use crate::config::RunConfig;
use crate::error::BenchError;
use crate::stats::{rate, MeasurementResult, Phase, PhaseSummary, StatisticsAggregator};
use crate::timer::{ClockSource, MultiClockTimer, SystemClock};
use crate::Result;

pub use plan::{plans_for, PhasePlan, PhaseSession};

/// Receiver of progress and results as the run proceeds
///
/// Every method has an empty default so sinks only implement what they show.
pub trait ResultSink {
    fn phase_started(&mut self, _phase: Phase, _repeats: u32) {}

    /// One repeat finished; `running` summarizes the phase so far
    fn record(&mut self, _result: &MeasurementResult, _running: &PhaseSummary) {}

    /// `summary` is `None` when the phase ran zero repeats
    fn phase_finished(&mut self, _phase: Phase, _summary: Option<&PhaseSummary>) {}

    fn teardown_failed(&mut self, _error: &BenchError) {}
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl ResultSink for NullSink {}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub results: Vec<MeasurementResult>,
    pub summaries: Vec<PhaseSummary>,
    /// Non-fatal teardown failures, in order
    pub teardown_warnings: Vec<String>,
}

/// Drives phase plans through timed repeats
pub struct Orchestrator<C: ClockSource = SystemClock> {
    timer: MultiClockTimer<C>,
    stats: StatisticsAggregator,
    summaries: Vec<PhaseSummary>,
    teardown_warnings: Vec<String>,
}

impl Orchestrator<SystemClock> {
    /// Orchestrator over the system clocks, probed now
    pub fn new() -> Self {
        Self::with_timer(MultiClockTimer::probe(SystemClock))
    }
}

impl Default for Orchestrator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ClockSource> Orchestrator<C> {
    pub fn with_timer(timer: MultiClockTimer<C>) -> Self {
        Self {
            timer,
            stats: StatisticsAggregator::new(),
            summaries: Vec::new(),
            teardown_warnings: Vec::new(),
        }
    }

    pub fn timer(&self) -> &MultiClockTimer<C> {
        &self.timer
    }

    pub fn statistics(&self) -> &StatisticsAggregator {
        &self.stats
    }

    pub fn teardown_warnings(&self) -> &[String] {
        &self.teardown_warnings
    }

    /// Run every phase of `config.operation`
    ///
    /// The first fatal error aborts the run; results recorded before it stay
    /// in `statistics()`.
    pub fn run(&mut self, config: &RunConfig, sink: &mut dyn ResultSink) -> Result<RunReport> {
        tracing::info!(
            operation = %config.operation,
            path = %config.path.display(),
            repeats = config.repeats,
            "starting benchmark"
        );

        for mut plan in plans_for(config) {
            self.run_phase(plan.as_mut(), config.repeats, sink)?;
        }

        Ok(self.report())
    }

    /// Run `repeats` repeats of one phase, then summarize it
    ///
    /// Returns `None` without summarizing when `repeats` is 0.
    pub fn run_phase(
        &mut self,
        plan: &mut dyn PhasePlan,
        repeats: u32,
        sink: &mut dyn ResultSink,
    ) -> Result<Option<PhaseSummary>> {
        let phase = plan.phase();
        tracing::info!(%phase, repeats, "phase starting");
        sink.phase_started(phase, repeats);

        for repeat in 0..repeats {
            self.run_repeat(plan, repeat, sink)?;
        }

        if repeats == 0 {
            tracing::info!(%phase, "no repeats requested, nothing to summarize");
            sink.phase_finished(phase, None);
            return Ok(None);
        }

        let summary = self.stats.summarize(phase)?;
        tracing::info!(%phase, median = summary.mbps.median, average = summary.mbps.average, "phase finished");
        self.summaries.push(summary);
        sink.phase_finished(phase, Some(&summary));
        Ok(Some(summary))
    }

    fn run_repeat(
        &mut self,
        plan: &mut dyn PhasePlan,
        repeat: u32,
        sink: &mut dyn ResultSink,
    ) -> Result<()> {
        let phase = plan.phase();
        tracing::debug!(%phase, repeat, "setup");
        let mut session = plan.setup(repeat)?;

        let delay = plan.delay();
        if !delay.is_zero() {
            tracing::debug!(%phase, delay_ms = delay.as_millis() as u64, "settling");
            thread::sleep(delay);
        }

        let outcome = self.measure(phase, repeat, session.as_mut(), sink);

        tracing::debug!(%phase, repeat, "teardown");
        for error in session.teardown() {
            tracing::warn!(%phase, repeat, error = %error, "teardown failed");
            sink.teardown_failed(&error);
            self.teardown_warnings.push(error.to_string());
        }

        outcome
    }

    /// Time and record every zone of one session
    fn measure(
        &mut self,
        phase: Phase,
        repeat: u32,
        session: &mut dyn PhaseSession,
        sink: &mut dyn ResultSink,
    ) -> Result<()> {
        for zone in 0..session.zones() {
            let start = self.timer.start();
            let transferred = session.transfer();
            let interval = self.timer.stop(start);

            let bytes = transferred?;
            let rate = rate::from_interval(bytes, &interval)
                .map_err(|_| BenchError::Indeterminate { phase, repeat })?;
            let result = MeasurementResult::from_rate(phase, repeat, bytes, rate)
                .at_offset(session.zone_offset(zone));

            self.stats.append(result);
            let running = self.stats.summarize(phase)?;
            sink.record(&result, &running);
        }
        Ok(())
    }

    /// Snapshot of everything recorded so far
    pub fn report(&self) -> RunReport {
        RunReport {
            results: self.stats.all_results(),
            summaries: self.summaries.clone(),
            teardown_warnings: self.teardown_warnings.clone(),
        }
    }
}
