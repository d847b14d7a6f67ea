//! Tickers - the periodic driver of the poll loop
//!
//! A ticker is armed with `start()` and disarmed with `stop()`. While armed, the
//! timeline's run loop polls once per `wait()`.
//! - `SpinTicker`: realtime, sleeps one period with spin_sleep for precise wakeups
//! - `ManualTicker`: offline, moves a `ManualTime` forward one period instead of sleeping

use crate::clock::ManualTime;
use spin_sleep::SpinSleeper;
use std::time::Duration;

/// Periodic poll driver.
pub trait Ticker {
    /// Arm the ticker. Any previous run is stopped first.
    fn start(&mut self);

    /// Disarm the ticker. Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Block until the next tick is due.
    fn wait(&mut self);

    /// Nominal tick period.
    fn period(&self) -> Duration;
}

/// Realtime ticker.
pub struct SpinTicker {
    period: Duration,
    sleeper: SpinSleeper,
    running: bool,
}

impl SpinTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            sleeper: SpinSleeper::default(),
            running: false,
        }
    }
}

impl Ticker for SpinTicker {
    fn start(&mut self) {
        self.stop();
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn wait(&mut self) {
        self.sleeper.sleep(self.period);
    }

    fn period(&self) -> Duration {
        self.period
    }
}

/// Offline ticker: each wait advances virtual time by one period.
#[derive(Clone, Debug)]
pub struct ManualTicker {
    time: ManualTime,
    period: Duration,
    running: bool,
}

impl ManualTicker {
    pub fn new(time: ManualTime, period: Duration) -> Self {
        Self {
            time,
            period,
            running: false,
        }
    }
}

impl Ticker for ManualTicker {
    fn start(&mut self) {
        self.stop();
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn wait(&mut self) {
        self.time.advance(self.period.as_secs_f64());
    }

    fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_start_stop_idempotent() {
        let mut ticker = SpinTicker::new(Duration::from_millis(1));
        assert!(!ticker.is_running());
        ticker.start();
        ticker.start();
        assert!(ticker.is_running());
        ticker.stop();
        ticker.stop();
        assert!(!ticker.is_running());
    }

    #[test]
    fn test_spin_ticker_waits_one_period() {
        let mut ticker = SpinTicker::new(Duration::from_millis(5));
        let t0 = Instant::now();
        ticker.wait();
        assert!(t0.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_manual_ticker_advances_time() {
        let time = ManualTime::new();
        let mut ticker = ManualTicker::new(time.clone(), Duration::from_millis(250));
        ticker.start();
        for _ in 0..4 {
            ticker.wait();
        }
        assert!((time.now() - 1.0).abs() < 1e-9);
        assert_eq!(ticker.period(), Duration::from_millis(250));
    }
}
