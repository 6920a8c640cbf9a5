//! Transfer rate and CPU utilization
//!
//! MBPS uses binary megabytes (1 MB = 1048576 bytes) over wall-clock seconds.
//! Utilization is process CPU seconds over the same wall-clock seconds. Both
//! inputs must come from one `TimedInterval`.

use serde::Serialize;

use crate::error::StatsError;
use crate::timer::{ClockId, TimedInterval};

pub const BYTES_PER_MEGABYTE: f64 = 1_048_576.0;

/// Rate of one timed transfer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rate {
    pub mbps: f64,
    pub utilization: Option<f64>,
}

/// Compute MBPS and utilization
///
/// # Errors
///
/// `StatsError::Indeterminate` if `wall_seconds` is not positive (or NaN).
pub fn compute(bytes: u64, wall_seconds: f64, cpu_seconds: f64) -> Result<Rate, StatsError> {
    if !(wall_seconds > 0.0) {
        return Err(StatsError::Indeterminate);
    }

    let megabytes = bytes as f64 / BYTES_PER_MEGABYTE;
    Ok(Rate {
        mbps: megabytes / wall_seconds,
        utilization: Some(cpu_seconds / wall_seconds),
    })
}

/// Compute the rate of a transfer timed by `interval`
///
/// Wall time is the realtime clock and CPU time is the process CPU clock. An
/// invalid realtime interval is `Indeterminate`; an invalid CPU interval only
/// drops the utilization.
pub fn from_interval(bytes: u64, interval: &TimedInterval) -> Result<Rate, StatsError> {
    let wall = interval
        .elapsed(ClockId::Realtime)
        .ok_or(StatsError::Indeterminate)?;

    match interval.elapsed(ClockId::ProcessCpu) {
        Some(cpu) => compute(bytes, wall, cpu),
        None => compute(bytes, wall, 0.0).map(|rate| Rate {
            utilization: None,
            ..rate
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::mock::ScriptedClock;
    use crate::timer::MultiClockTimer;

    #[test]
    fn test_one_megabyte_per_second() {
        let rate = compute(1_048_576, 1.0, 0.5).unwrap();
        assert_eq!(rate.mbps, 1.0);
        assert_eq!(rate.utilization, Some(0.5));
    }

    #[test]
    fn test_zero_wall_time() {
        assert_eq!(compute(1_048_576, 0.0, 0.5), Err(StatsError::Indeterminate));
    }

    #[test]
    fn test_negative_wall_time() {
        assert_eq!(compute(1_048_576, -0.25, 0.5), Err(StatsError::Indeterminate));
        assert_eq!(compute(1_048_576, f64::NAN, 0.5), Err(StatsError::Indeterminate));
    }

    #[test]
    fn test_from_interval() {
        let clock = ScriptedClock::new();
        clock.push_interval(ClockId::Realtime, 2.0);
        clock.push_interval(ClockId::ProcessCpu, 0.5);
        let timer = MultiClockTimer::probe(clock);

        let start = timer.start();
        let interval = timer.stop(start);

        let rate = from_interval(4 * 1_048_576, &interval).unwrap();
        assert_eq!(rate.mbps, 2.0);
        assert_eq!(rate.utilization, Some(0.25));
    }

    #[test]
    fn test_from_interval_without_cpu_clock() {
        let clock = ScriptedClock::new();
        clock.fail_resolution(ClockId::ProcessCpu);
        clock.push_interval(ClockId::Realtime, 1.0);
        let timer = MultiClockTimer::probe(clock);

        let interval = timer.stop(timer.start());
        let rate = from_interval(1_048_576, &interval).unwrap();
        assert_eq!(rate.mbps, 1.0);
        assert_eq!(rate.utilization, None);
    }

    #[test]
    fn test_from_interval_without_wall_clock() {
        let clock = ScriptedClock::new();
        clock.fail_resolution(ClockId::Realtime);
        let timer = MultiClockTimer::probe(clock);

        let interval = timer.stop(timer.start());
        assert_eq!(from_interval(1_048_576, &interval), Err(StatsError::Indeterminate));
    }
}
