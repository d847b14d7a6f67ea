//! Clocks
//!
//! A clock measures seconds elapsed since its last `start()`. The realtime clock
//! reads `Instant`; the manual clock reads a shared virtual time that only moves
//! when told to, for deterministic offline runs.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic elapsed-time source.
pub trait Clock {
    /// Reset the origin to now.
    fn start(&mut self);

    /// Non-negative seconds since the last `start()`.
    fn elapsed(&self) -> f64;
}

/// Wall clock backed by `Instant`.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn start(&mut self) {
        self.origin = Instant::now();
    }

    fn elapsed(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Shared virtual "now" in seconds.
///
/// Clones observe the same time, so several manual clocks and tickers can be
/// driven from one place.
#[derive(Clone, Debug, Default)]
pub struct ManualTime(Rc<Cell<f64>>);

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.0.get()
    }

    /// Move time forward by `dt` seconds. Negative and NaN steps are ignored.
    pub fn advance(&self, dt: f64) {
        if dt > 0.0 {
            self.0.set(self.0.get() + dt);
        }
    }

    /// Jump to `t`, never backwards.
    pub fn set(&self, t: f64) {
        if t > self.0.get() {
            self.0.set(t);
        }
    }
}

/// Clock measuring elapsed virtual time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    time: ManualTime,
    origin: f64,
}

impl ManualClock {
    pub fn new(time: ManualTime) -> Self {
        let origin = time.now();
        Self { time, origin }
    }

    pub fn time(&self) -> &ManualTime {
        &self.time
    }
}

impl Clock for ManualClock {
    fn start(&mut self) {
        self.origin = self.time.now();
    }

    fn elapsed(&self) -> f64 {
        (self.time.now() - self.origin).max(0.0)
    }
}
