//! Mock phase plan for testing
//!
//! Runs the repeat loop over a [`MockPrimitive`] instead of a real target, so
//! orchestration, rate and statistics can be exercised with a scripted clock
//! and no filesystem.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use super::plan::{PhasePlan, PhaseSession};
use crate::engine::mock::{MockPrimitive, MockStep};
use crate::engine::run;
use crate::error::BenchError;
use crate::stats::Phase;
use crate::Result;

const MOCK_PATH: &str = "mock.bin";

/// Phase plan backed by a scripted primitive
#[derive(Debug)]
pub struct MockPlan {
    phase: Phase,
    total: u64,
    request: usize,
    scripts: VecDeque<Vec<MockStep>>,
    delay: Duration,
    latency: Option<Duration>,
    zones: u64,
    fail_setup: bool,
    fail_teardown: bool,
    setups: u32,
    teardowns: Rc<Cell<u32>>,
}

impl MockPlan {
    /// Each repeat moves `total` bytes in requests of `request`
    pub fn new(phase: Phase, total: u64, request: usize) -> Self {
        Self {
            phase,
            total,
            request,
            scripts: VecDeque::new(),
            delay: Duration::ZERO,
            latency: None,
            zones: 1,
            fail_setup: false,
            fail_teardown: false,
            setups: 0,
            teardowns: Rc::new(Cell::new(0)),
        }
    }

    /// Script for the next unscripted repeat; later repeats complete in full
    pub fn with_script(mut self, script: Vec<MockStep>) -> Self {
        self.scripts.push_back(script);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleep for `latency` on every primitive call, inside the timed interval
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Profile each repeat as `zones` zones of `total` bytes each
    pub fn with_zones(mut self, zones: u64) -> Self {
        self.zones = zones;
        self
    }

    pub fn failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    /// Every teardown reports one delete failure
    pub fn failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    pub fn setups(&self) -> u32 {
        self.setups
    }

    pub fn teardowns(&self) -> u32 {
        self.teardowns.get()
    }
}

impl PhasePlan for MockPlan {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn setup(&mut self, _repeat: u32) -> Result<Box<dyn PhaseSession>> {
        self.setups += 1;
        if self.fail_setup {
            return Err(BenchError::Open {
                operation: "file create",
                path: PathBuf::from(MOCK_PATH),
                source: io::Error::from_raw_os_error(libc::EACCES),
            });
        }

        let mut primitive = MockPrimitive::with_script(self.scripts.pop_front().unwrap_or_default());
        if let Some(latency) = self.latency {
            primitive = primitive.with_latency(latency);
        }
        Ok(Box::new(MockSession {
            primitive,
            zones: self.zones,
            total: self.total,
            request: self.request,
            fail_teardown: self.fail_teardown,
            teardowns: Rc::clone(&self.teardowns),
        }))
    }
}

struct MockSession {
    primitive: MockPrimitive,
    zones: u64,
    total: u64,
    request: usize,
    fail_teardown: bool,
    teardowns: Rc<Cell<u32>>,
}

impl PhaseSession for MockSession {
    fn zones(&self) -> u64 {
        self.zones
    }

    fn zone_offset(&self, zone: u64) -> Option<u64> {
        (self.zones > 1).then(|| zone * self.total)
    }

    fn transfer(&mut self) -> Result<u64> {
        run(&mut self.primitive, self.total, self.request).map_err(|source| BenchError::Transfer {
            operation: "mock transfer",
            path: PathBuf::from(MOCK_PATH),
            source,
        })
    }

    fn teardown(self: Box<Self>) -> Vec<BenchError> {
        self.teardowns.set(self.teardowns.get() + 1);
        if !self.fail_teardown {
            return Vec::new();
        }
        vec![BenchError::Teardown {
            operation: "file delete",
            path: PathBuf::from(MOCK_PATH),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        }]
    }
}
