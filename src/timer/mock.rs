//! Scripted clock source for tests
//!
//! Each clock replays a queue of readings. When a clock's queue runs dry it
//! keeps returning its last reading, so an unscripted interval measures zero.
//! Resolution and reading failures can be injected per clock, and every
//! `now()` call is counted.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;

use super::{ClockId, ClockSource, Timespec, CLOCK_COUNT};

#[derive(Debug, Default)]
pub struct ScriptedClock {
    readings: RefCell<[VecDeque<Timespec>; CLOCK_COUNT]>,
    last: [Cell<Timespec>; CLOCK_COUNT],
    resolution_failures: [Cell<bool>; CLOCK_COUNT],
    now_failures: [Cell<u32>; CLOCK_COUNT],
    now_calls: [Cell<usize>; CLOCK_COUNT],
}

impl ScriptedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reading for `clock`
    pub fn push_reading(&self, clock: ClockId, reading: Timespec) {
        self.readings.borrow_mut()[clock.index()].push_back(reading);
    }

    /// Queue a start/stop pair `seconds` apart, continuing from the last queued reading
    pub fn push_interval(&self, clock: ClockId, seconds: f64) {
        let base = self.readings.borrow()[clock.index()]
            .back()
            .copied()
            .unwrap_or_else(|| self.last[clock.index()].get());
        let base_ns = base.seconds as i128 * 1_000_000_000 + base.nanoseconds as i128;
        let end_ns = base_ns + (seconds * 1e9).round() as i128;

        self.push_reading(clock, base);
        self.push_reading(
            clock,
            Timespec {
                seconds: end_ns.div_euclid(1_000_000_000) as i64,
                nanoseconds: end_ns.rem_euclid(1_000_000_000) as i64,
            },
        );
    }

    /// Make the resolution query for `clock` fail
    pub fn fail_resolution(&self, clock: ClockId) {
        self.resolution_failures[clock.index()].set(true);
    }

    /// Make the next reading of `clock` fail
    pub fn fail_next_now(&self, clock: ClockId) {
        let cell = &self.now_failures[clock.index()];
        cell.set(cell.get() + 1);
    }

    /// Number of `now()` calls made for `clock`, failed ones included
    pub fn now_calls(&self, clock: ClockId) -> usize {
        self.now_calls[clock.index()].get()
    }
}

impl ClockSource for ScriptedClock {
    fn resolution(&self, clock: ClockId) -> io::Result<Timespec> {
        if self.resolution_failures[clock.index()].get() {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        Ok(Timespec {
            seconds: 0,
            nanoseconds: 1,
        })
    }

    fn now(&self, clock: ClockId) -> io::Result<Timespec> {
        let i = clock.index();
        self.now_calls[i].set(self.now_calls[i].get() + 1);

        let pending = self.now_failures[i].get();
        if pending > 0 {
            self.now_failures[i].set(pending - 1);
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }

        let reading = self.readings.borrow_mut()[i]
            .pop_front()
            .unwrap_or_else(|| self.last[i].get());
        self.last[i].set(reading);
        Ok(reading)
    }
}
