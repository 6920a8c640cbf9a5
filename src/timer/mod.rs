//! Multi-clock interval timer
//!
//! A timed interval is bracketed by samples of four clocks: realtime,
//! monotonic, process CPU time and thread CPU time. Realtime drives the MBPS
//! figure, process CPU time drives utilization, and the other two are kept
//! for the report.
//!
//! Clock failures never turn into zeros. A clock whose resolution probe fails
//! is unavailable for the life of the timer and is never read again. A failed
//! read at interval start invalidates that clock for the interval, and the
//! stop side then skips it.
//!
//! # Example
//!
//! ```no_run
//! use storbench::timer::{ClockId, MultiClockTimer, SystemClock};
//!
//! let timer = MultiClockTimer::probe(SystemClock);
//! let start = timer.start();
//! // ... transfer ...
//! let interval = timer.stop(start);
//! let wall = interval.elapsed(ClockId::Realtime);
//! ```

pub mod mock;

use serde::Serialize;
use std::fmt;
use std::io;

/// Number of clocks sampled per interval
pub const CLOCK_COUNT: usize = 4;

/// Sampled clocks, in sampling order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockId {
    Realtime,
    Monotonic,
    ProcessCpu,
    ThreadCpu,
}

impl ClockId {
    pub const ALL: [ClockId; CLOCK_COUNT] = [
        ClockId::Realtime,
        ClockId::Monotonic,
        ClockId::ProcessCpu,
        ClockId::ThreadCpu,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            ClockId::Realtime => 0,
            ClockId::Monotonic => 1,
            ClockId::ProcessCpu => 2,
            ClockId::ThreadCpu => 3,
        }
    }

    fn raw(self) -> libc::clockid_t {
        match self {
            ClockId::Realtime => libc::CLOCK_REALTIME,
            ClockId::Monotonic => libc::CLOCK_MONOTONIC,
            ClockId::ProcessCpu => libc::CLOCK_PROCESS_CPUTIME_ID,
            ClockId::ThreadCpu => libc::CLOCK_THREAD_CPUTIME_ID,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ClockId::Realtime => "CLOCK_REALTIME",
            ClockId::Monotonic => "CLOCK_MONOTONIC",
            ClockId::ProcessCpu => "CLOCK_PROCESS_CPUTIME_ID",
            ClockId::ThreadCpu => "CLOCK_THREAD_CPUTIME_ID",
        }
    }
}

impl fmt::Display for ClockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw clock reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timespec {
    pub seconds: i64,
    pub nanoseconds: i64,
}

/// Where clock readings come from
///
/// Production code uses [`SystemClock`]. Tests use [`mock::ScriptedClock`].
pub trait ClockSource {
    fn resolution(&self, clock: ClockId) -> io::Result<Timespec>;
    fn now(&self, clock: ClockId) -> io::Result<Timespec>;
}

/// `clock_getres` / `clock_gettime`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn resolution(&self, clock: ClockId) -> io::Result<Timespec> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid, writable timespec
        let ret = unsafe { libc::clock_getres(clock.raw(), &mut ts) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Timespec {
            seconds: ts.tv_sec as i64,
            nanoseconds: ts.tv_nsec as i64,
        })
    }

    #[inline]
    fn now(&self, clock: ClockId) -> io::Result<Timespec> {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid, writable timespec
        let ret = unsafe { libc::clock_gettime(clock.raw(), &mut ts) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Timespec {
            seconds: ts.tv_sec as i64,
            nanoseconds: ts.tv_nsec as i64,
        })
    }
}

/// One clock reading, or the marker that the clock is invalid
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ClockSample {
    pub available: bool,
    pub seconds: f64,
    pub nanoseconds: f64,
}

impl ClockSample {
    pub const INVALID: ClockSample = ClockSample {
        available: false,
        seconds: 0.0,
        nanoseconds: 0.0,
    };

    fn from_reading(reading: io::Result<Timespec>) -> Self {
        match reading {
            Ok(ts) => ClockSample {
                available: true,
                seconds: ts.seconds as f64,
                nanoseconds: ts.nanoseconds as f64,
            },
            Err(_) => Self::INVALID,
        }
    }

    /// Value in seconds
    pub fn as_seconds(&self) -> f64 {
        self.seconds + self.nanoseconds / 1e9
    }
}

/// Samples taken at interval start
#[derive(Debug, Clone, Copy)]
pub struct IntervalStart {
    samples: [ClockSample; CLOCK_COUNT],
}

impl IntervalStart {
    pub fn sample(&self, clock: ClockId) -> ClockSample {
        self.samples[clock.index()]
    }
}

/// Start and stop samples of one timed transfer
#[derive(Debug, Clone, Copy)]
pub struct TimedInterval {
    start: [ClockSample; CLOCK_COUNT],
    stop: [ClockSample; CLOCK_COUNT],
}

impl TimedInterval {
    /// Elapsed seconds on `clock`, `None` unless both endpoints are valid
    ///
    /// Negative deltas are returned as-is.
    pub fn elapsed(&self, clock: ClockId) -> Option<f64> {
        let i = clock.index();
        let (start, stop) = (self.start[i], self.stop[i]);
        if !(start.available && stop.available) {
            return None;
        }
        Some((stop.seconds - start.seconds) + (stop.nanoseconds - start.nanoseconds) / 1e9)
    }

    pub fn start_sample(&self, clock: ClockId) -> ClockSample {
        self.start[clock.index()]
    }

    pub fn stop_sample(&self, clock: ClockId) -> ClockSample {
        self.stop[clock.index()]
    }
}

/// Timer over the four clocks, probed once per run
pub struct MultiClockTimer<C: ClockSource = SystemClock> {
    source: C,
    resolutions: [ClockSample; CLOCK_COUNT],
}

impl<C: ClockSource> MultiClockTimer<C> {
    /// Query every clock's resolution once
    ///
    /// A clock whose query fails stays unavailable for the life of the timer.
    pub fn probe(source: C) -> Self {
        let mut resolutions = [ClockSample::INVALID; CLOCK_COUNT];
        for clock in ClockId::ALL {
            let reading = source.resolution(clock);
            if let Err(ref e) = reading {
                tracing::warn!(clock = clock.name(), error = %e, "clock resolution query failed, clock disabled");
            }
            resolutions[clock.index()] = ClockSample::from_reading(reading);
        }
        Self {
            source,
            resolutions,
        }
    }

    pub fn resolution(&self, clock: ClockId) -> ClockSample {
        self.resolutions[clock.index()]
    }

    pub fn is_available(&self, clock: ClockId) -> bool {
        self.resolutions[clock.index()].available
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    /// Sample every available clock
    #[inline]
    pub fn start(&self) -> IntervalStart {
        let mut samples = [ClockSample::INVALID; CLOCK_COUNT];
        for clock in ClockId::ALL {
            if self.is_available(clock) {
                samples[clock.index()] = ClockSample::from_reading(self.source.now(clock));
            }
        }
        IntervalStart { samples }
    }

    /// Sample every clock whose start sample is valid
    #[inline]
    pub fn stop(&self, start: IntervalStart) -> TimedInterval {
        let mut stop = [ClockSample::INVALID; CLOCK_COUNT];
        for clock in ClockId::ALL {
            if start.samples[clock.index()].available {
                stop[clock.index()] = ClockSample::from_reading(self.source.now(clock));
            }
        }
        TimedInterval {
            start: start.samples,
            stop,
        }
    }
}
