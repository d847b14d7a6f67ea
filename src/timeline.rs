//! Timeline - playback state, frame reconciliation, and the poll loop
//!
//! The timeline owns a schedule, a clock, and a ticker. Each poll compares the
//! frame the playhead has reached against the due frame of the soonest batch
//! and fires the batch once it is due.
//!
//! Polling is single-threaded: `run()` drives the ticker on the calling thread,
//! and no borrow of the timeline is held while operations execute, so
//! operations may call back into the timeline (`stop`, `pause`, `insert`, ...).

use crate::action::Operation;
use crate::clock::{Clock, ManualClock, ManualTime, MonotonicClock};
use crate::error::{is_positive, TimelineError, TimelineResult};
use crate::frames::{Frames, Playhead};
use crate::schedule::Schedule;
use crate::ticker::{ManualTicker, SpinTicker, Ticker};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Status of the timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Status {
    Stopped,
    Playing,
    /// Paused at the given offset in scheduled time.
    Paused(f64),
}

/// Configuration for creating a timeline.
#[derive(Clone, Debug)]
pub struct TimelineConfig {
    /// Tag added to every action the timeline inserts.
    pub identifier: String,
    /// Seconds per frame.
    pub rate: f64,
    pub playback_rate: f64,
    /// Nominal ticker period.
    pub tick_interval: Duration,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            rate: 1.0 / 120.0,
            playback_rate: 1.0,
            tick_interval: Duration::from_secs_f64(1.0 / 120.0),
        }
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> TimelineResult<()> {
        Playhead::new(self.rate, self.playback_rate).map(|_| ())
    }
}

struct TimelineInner {
    identifier: String,
    status: Status,
    playhead: Playhead,
    schedule: Schedule,
    clock: Box<dyn Clock>,
    ticker: Box<dyn Ticker>,
    completion: Option<Operation>,
}

impl Drop for TimelineInner {
    fn drop(&mut self) {
        self.ticker.stop();
    }
}

fn tagged(identifier: &str, extra: &[&str]) -> Vec<String> {
    std::iter::once(identifier)
        .chain(extra.iter().copied())
        .map(str::to_string)
        .collect()
}

/// Outcome of one poll, computed under the borrow and acted on after it.
enum Poll {
    Idle,
    Exhausted(Option<Operation>),
    Fire(Vec<Operation>),
}

/// Store closures to be performed at offsets, played back in real time or
/// scaled by the playback rate.
///
/// Cloning yields another handle to the same timeline. Operations that need to
/// reach their own timeline should capture a `WeakTimeline` to avoid a cycle.
#[derive(Clone)]
pub struct Timeline(Rc<RefCell<TimelineInner>>);

/// Non-owning handle to a timeline.
#[derive(Clone)]
pub struct WeakTimeline(Weak<RefCell<TimelineInner>>);

impl WeakTimeline {
    pub fn upgrade(&self) -> Option<Timeline> {
        self.0.upgrade().map(Timeline)
    }
}

impl Timeline {
    /// Realtime timeline: wall clock and a spin-sleep ticker.
    pub fn new(config: TimelineConfig) -> TimelineResult<Self> {
        let ticker = SpinTicker::new(config.tick_interval);
        Self::with_parts(config, Box::new(MonotonicClock::new()), Box::new(ticker))
    }

    /// Offline timeline on virtual `time`. Each tick advances `time` by the
    /// configured tick interval, so `run()` completes as fast as it can compute.
    pub fn offline(config: TimelineConfig, time: ManualTime) -> TimelineResult<Self> {
        let clock = ManualClock::new(time.clone());
        let ticker = ManualTicker::new(time, config.tick_interval);
        Self::with_parts(config, Box::new(clock), Box::new(ticker))
    }

    /// Timeline with injected clock and ticker.
    pub fn with_parts(
        config: TimelineConfig,
        clock: Box<dyn Clock>,
        ticker: Box<dyn Ticker>,
    ) -> TimelineResult<Self> {
        let playhead = Playhead::new(config.rate, config.playback_rate)?;
        Ok(Timeline(Rc::new(RefCell::new(TimelineInner {
            identifier: config.identifier,
            status: Status::Stopped,
            playhead,
            schedule: Schedule::new(),
            clock,
            ticker,
            completion: None,
        }))))
    }

    /// Set the closure called when playback runs out of scheduled actions.
    pub fn with_completion<F>(self, completion: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.set_completion(completion);
        self
    }

    pub fn set_completion<F>(&self, completion: F)
    where
        F: FnMut() + 'static,
    {
        self.0.borrow_mut().completion = Some(Operation::new(completion));
    }

    pub fn downgrade(&self) -> WeakTimeline {
        WeakTimeline(Rc::downgrade(&self.0))
    }

    // --- Accessors ---

    pub fn identifier(&self) -> String {
        self.0.borrow().identifier.clone()
    }

    pub fn status(&self) -> Status {
        self.0.borrow().status
    }

    /// Seconds per frame.
    pub fn rate(&self) -> f64 {
        self.0.borrow().playhead.rate()
    }

    pub fn playback_rate(&self) -> f64 {
        self.0.borrow().playhead.playback_rate()
    }

    /// Scheduled time accumulated across pauses.
    pub fn last_paused_date(&self) -> f64 {
        self.0.borrow().playhead.last_paused_date()
    }

    /// Change the playback rate. While playing, the timeline is paused and
    /// resumed around the change so that time already played keeps the old rate.
    pub fn set_playback_rate(&self, playback_rate: f64) -> TimelineResult<()> {
        if !is_positive(playback_rate) {
            return Err(TimelineError::InvalidPlaybackRate(playback_rate));
        }
        let playing = self.status() == Status::Playing;
        if playing {
            self.pause();
        }
        self.0.borrow_mut().playhead.set_playback_rate(playback_rate)?;
        tracing::debug!(timeline = %self.identifier(), playback_rate, "playback rate changed");
        if playing {
            self.resume();
        }
        Ok(())
    }

    /// Frame the playhead has reached.
    pub fn current_frame(&self) -> Frames {
        let inner = self.0.borrow();
        inner.playhead.current_frame(inner.clock.elapsed())
    }

    /// Frame at which an action at `offset` becomes due under the current
    /// playback rate.
    pub fn playback_frames(&self, offset: f64) -> Frames {
        self.0.borrow().playhead.due_frame(offset)
    }

    /// Soonest pending offset and the number of actions due there.
    pub fn next(&self) -> Option<(f64, usize)> {
        self.0
            .borrow()
            .schedule
            .next()
            .map(|n| (n.offset, n.actions.len()))
    }

    /// Inspect the schedule.
    pub fn with_schedule<R>(&self, f: impl FnOnce(&Schedule) -> R) -> R {
        f(&self.0.borrow().schedule)
    }

    // --- Building the schedule ---

    /// Schedule `operation` at `offset` seconds, tagged with this timeline's
    /// identifier.
    ///
    /// Atomic batches at or before the last fired offset are never reached:
    /// an operation inserted at its own offset (or earlier) from inside a
    /// running operation is skipped.
    pub fn insert<F>(&self, offset: f64, operation: F) -> TimelineResult<()>
    where
        F: FnMut() + 'static,
    {
        let mut inner = self.0.borrow_mut();
        let identifiers = vec![inner.identifier.clone()];
        inner.schedule.insert(offset, identifiers, operation)
    }

    /// Schedule `operation` every `interval` seconds from `start_offset`.
    pub fn loop_every<F>(&self, interval: f64, start_offset: f64, operation: F) -> TimelineResult<()>
    where
        F: FnMut() + 'static,
    {
        let mut inner = self.0.borrow_mut();
        let identifiers = vec![inner.identifier.clone()];
        inner
            .schedule
            .loop_every(interval, start_offset, identifiers, operation)
    }

    /// Like `insert`, with extra tags after the timeline's identifier.
    pub fn insert_tagged<F>(&self, offset: f64, identifiers: &[&str], operation: F) -> TimelineResult<()>
    where
        F: FnMut() + 'static,
    {
        let mut inner = self.0.borrow_mut();
        let tags = tagged(&inner.identifier, identifiers);
        inner.schedule.insert(offset, tags, operation)
    }

    /// Like `loop_every`, with extra tags after the timeline's identifier.
    pub fn loop_tagged<F>(
        &self,
        interval: f64,
        start_offset: f64,
        identifiers: &[&str],
        operation: F,
    ) -> TimelineResult<()>
    where
        F: FnMut() + 'static,
    {
        let mut inner = self.0.borrow_mut();
        let tags = tagged(&inner.identifier, identifiers);
        inner
            .schedule
            .loop_every(interval, start_offset, tags, operation)
    }

    /// Move a prebuilt schedule into this timeline. Its actions keep their own tags.
    pub fn insert_contents_of(&self, schedule: Schedule) {
        self.0.borrow_mut().schedule.insert_contents_of(schedule);
    }

    /// Remove actions tagged with any of `identifiers`, or all actions if empty.
    /// Takes effect before the next poll.
    pub fn remove_all<S: AsRef<str>>(&self, identifiers: &[S]) -> usize {
        self.0.borrow_mut().schedule.remove_all(identifiers)
    }

    // --- Playback ---

    /// Start from the beginning of scheduled time. No-op while playing.
    pub fn start(&self) {
        let mut inner = self.0.borrow_mut();
        if inner.status == Status::Playing {
            return;
        }
        inner.playhead.reset();
        inner.clock.start();
        inner.ticker.start();
        inner.status = Status::Playing;
        tracing::debug!(timeline = %inner.identifier, "started");
    }

    /// Stop and rewind the playhead. The schedule is kept. No-op while stopped.
    pub fn stop(&self) {
        let mut inner = self.0.borrow_mut();
        if inner.status == Status::Stopped {
            return;
        }
        inner.playhead.reset();
        inner.ticker.stop();
        inner.status = Status::Stopped;
        tracing::debug!(timeline = %inner.identifier, "stopped");
    }

    /// Freeze playback, folding the time played since the last start or resume
    /// into the pause pivot. Only a playing timeline can be paused.
    pub fn pause(&self) {
        let mut guard = self.0.borrow_mut();
        let inner = &mut *guard;
        if inner.status != Status::Playing {
            return;
        }
        let pivot = inner.playhead.pause(inner.clock.elapsed());
        inner.ticker.stop();
        inner.status = Status::Paused(pivot);
        tracing::debug!(timeline = %inner.identifier, last_paused_date = pivot, "paused");
    }

    /// Continue from the pause pivot. No-op while playing.
    pub fn resume(&self) {
        let mut inner = self.0.borrow_mut();
        if inner.status == Status::Playing {
            return;
        }
        inner.clock.start();
        inner.ticker.start();
        inner.status = Status::Playing;
        tracing::debug!(
            timeline = %inner.identifier,
            last_paused_date = inner.playhead.last_paused_date(),
            "resumed"
        );
    }

    /// Seeking is not supported.
    pub fn skip_to(&self, _offset: f64) -> TimelineResult<()> {
        Err(TimelineError::SeekUnsupported)
    }

    // --- Polling ---

    /// One poll: fire the soonest batch if its due frame has been reached, or
    /// stop and call the completion closure if nothing is left. Does nothing
    /// unless the timeline is playing.
    ///
    /// On exhaustion the timeline is stopped before the completion closure
    /// runs, so the closure observes `Status::Stopped` and may call `start()`.
    ///
    /// The schedule is advanced before the batch's operations run. Operations
    /// are not isolated: a panic inside one unwinds out of this call (and out
    /// of `run()`), skipping the rest of the batch.
    pub fn advance(&self) {
        match self.poll() {
            Poll::Idle => {}
            Poll::Exhausted(completion) => {
                tracing::debug!(timeline = %self.identifier(), "schedule exhausted");
                self.stop();
                if let Some(completion) = completion {
                    completion.perform();
                }
            }
            Poll::Fire(operations) => {
                for operation in operations {
                    if !operation.perform() {
                        tracing::warn!(timeline = %self.identifier(), "skipped re-entrant operation");
                    }
                }
            }
        }
    }

    fn poll(&self) -> Poll {
        let mut guard = self.0.borrow_mut();
        let inner = &mut *guard;

        // Stopped and paused timelines are frozen.
        if inner.status != Status::Playing {
            return Poll::Idle;
        }

        let Some(next) = inner.schedule.next() else {
            return Poll::Exhausted(inner.completion.clone());
        };

        let elapsed = inner.clock.elapsed();
        let current = inner.playhead.current_frame(elapsed);
        let due = inner.playhead.due_frame(next.offset);
        if current < due {
            return Poll::Idle;
        }

        tracing::trace!(
            timeline = %inner.identifier,
            offset = next.offset,
            due_frame = due,
            current_frame = current,
            actions = next.actions.len(),
            "firing batch"
        );
        let operations = next.operations();
        inner.schedule.advance();
        Poll::Fire(operations)
    }

    pub fn is_ticking(&self) -> bool {
        self.0.borrow().ticker.is_running()
    }

    /// Poll once if the ticker is running, without waiting. Returns whether the
    /// ticker is still running afterwards.
    pub fn tick(&self) -> bool {
        if self.is_ticking() {
            self.advance();
        }
        self.is_ticking()
    }

    fn wait(&self) {
        self.0.borrow_mut().ticker.wait();
    }

    /// Drive the poll loop until the ticker stops (stop, pause, or exhaustion).
    pub fn run(&self) {
        self.run_until(|| false);
    }

    /// Drive the poll loop until the ticker stops or `is_done` returns true.
    pub fn run_until<F>(&self, is_done: F)
    where
        F: Fn() -> bool,
    {
        while self.tick() && !is_done() {
            self.wait();
        }
    }

    /// Run at most `n` tick cycles (poll, then wait).
    pub fn step(&self, n: usize) {
        for _ in 0..n {
            if !self.tick() {
                break;
            }
            self.wait();
        }
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.borrow().schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn offline(identifier: &str) -> (Timeline, ManualTime) {
        let time = ManualTime::new();
        let config = TimelineConfig {
            identifier: identifier.to_string(),
            ..Default::default()
        };
        (Timeline::offline(config, time.clone()).unwrap(), time)
    }

    #[test]
    fn test_state_at_init_stopped() {
        let (timeline, _) = offline("");
        assert_eq!(timeline.status(), Status::Stopped);
        assert!(!timeline.is_ticking());
    }

    #[test]
    fn test_config_validation() {
        let bad_rate = TimelineConfig {
            rate: 0.0,
            ..Default::default()
        };
        assert_eq!(bad_rate.validate().unwrap_err(), TimelineError::InvalidRate(0.0));
        assert!(Timeline::new(bad_rate).is_err());

        let bad_playback = TimelineConfig {
            playback_rate: -1.0,
            ..Default::default()
        };
        assert!(Timeline::offline(bad_playback, ManualTime::new()).is_err());
        assert!(TimelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_insert_tags_with_identifier() {
        let (timeline, _) = offline("ABC");
        timeline.insert(0.0, || {}).unwrap();
        timeline.loop_every(1.0, 0.0, || {}).unwrap();

        timeline.with_schedule(|s| {
            let next = s.next().unwrap();
            assert_eq!(next.actions.len(), 2);
            assert!(next.actions.iter().all(|a| a.identifiers() == ["ABC"]));
        });
    }

    #[test]
    fn test_tagged_insert_and_removal() {
        let (timeline, _) = offline("song");
        timeline.insert_tagged(0.0, &["ABC"], || {}).unwrap();
        timeline.insert_tagged(0.0, &["XYZ"], || {}).unwrap();
        timeline.loop_tagged(1.0, 0.0, &["ABC"], || {}).unwrap();

        timeline.with_schedule(|s| {
            let next = s.next().unwrap();
            assert_eq!(next.actions[0].identifiers(), ["song", "ABC"]);
        });

        assert_eq!(timeline.remove_all(&["ABC"]), 2);
        assert_eq!(timeline.next(), Some((0.0, 1)));
        assert_eq!(timeline.remove_all(&["song"]), 1);
        assert_eq!(timeline.next(), None);
    }

    #[test]
    fn test_transitions() {
        let (timeline, time) = offline("");
        timeline.insert(10.0, || {}).unwrap();

        timeline.pause();
        assert_eq!(timeline.status(), Status::Stopped);

        timeline.start();
        assert_eq!(timeline.status(), Status::Playing);
        assert!(timeline.is_ticking());

        time.advance(1.5);
        timeline.pause();
        assert_eq!(timeline.status(), Status::Paused(1.5));
        assert!(!timeline.is_ticking());

        // A second pause does not accumulate again.
        time.advance(1.0);
        timeline.pause();
        assert_eq!(timeline.last_paused_date(), 1.5);

        timeline.resume();
        assert_eq!(timeline.status(), Status::Playing);
        assert_eq!(timeline.last_paused_date(), 1.5);

        timeline.stop();
        assert_eq!(timeline.status(), Status::Stopped);
        assert_eq!(timeline.last_paused_date(), 0.0);
        assert_eq!(timeline.next(), Some((10.0, 1)));
    }

    #[test]
    fn test_start_resets_pause_pivot() {
        let (timeline, time) = offline("");
        timeline.insert(10.0, || {}).unwrap();
        timeline.start();
        time.advance(2.0);
        timeline.pause();
        assert_eq!(timeline.last_paused_date(), 2.0);

        timeline.start();
        assert_eq!(timeline.last_paused_date(), 0.0);
        assert_eq!(timeline.current_frame(), 0);
    }

    #[test]
    fn test_advance_fires_only_when_due() {
        let (timeline, time) = offline("");
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        timeline.insert(1.0, move || c.set(c.get() + 1)).unwrap();
        timeline.start();

        time.advance(0.99);
        timeline.advance();
        assert_eq!(count.get(), 0);

        time.advance(0.01);
        timeline.advance();
        assert_eq!(count.get(), 1);

        // Level-triggered: nothing left, so the next poll stops.
        timeline.advance();
        assert_eq!(timeline.status(), Status::Stopped);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_advance_does_nothing_unless_playing() {
        let (timeline, time) = offline("");
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        timeline.insert(1.0, move || c.set(c.get() + 1)).unwrap();
        let c = count.clone();
        timeline.insert(5.0, move || c.set(c.get() + 10)).unwrap();

        // Never started.
        time.advance(2.0);
        timeline.advance();
        assert_eq!(count.get(), 0);
        assert_eq!(timeline.status(), Status::Stopped);

        timeline.start();
        time.advance(0.5);
        timeline.pause();
        time.advance(10.0);
        timeline.advance();
        timeline.advance();
        assert_eq!(count.get(), 0);
        assert_eq!(timeline.status(), Status::Paused(0.5));

        // Resumed at 0.5: offset 1 is due half a second later.
        timeline.resume();
        time.advance(0.5);
        timeline.advance();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_insert_behind_cursor_is_skipped() {
        let (timeline, time) = offline("");
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let weak = timeline.downgrade();
        timeline
            .insert(1.0, move || {
                if let Some(t) = weak.upgrade() {
                    let c = c.clone();
                    t.insert(1.0, move || c.set(c.get() + 1)).unwrap();
                }
            })
            .unwrap();
        timeline.insert(2.0, || {}).unwrap();

        timeline.start();
        time.advance(1.0);
        timeline.advance();
        assert_eq!(timeline.next(), Some((2.0, 1)));
        time.advance(1.0);
        timeline.advance();
        timeline.advance();
        assert_eq!(count.get(), 0);
        assert_eq!(timeline.status(), Status::Stopped);
    }

    #[test]
    fn test_completion_sees_stopped_status() {
        let seen = Rc::new(Cell::new(None));
        let s = seen.clone();
        let (timeline, _) = offline("");
        let weak = timeline.downgrade();
        timeline.set_completion(move || s.set(weak.upgrade().map(|t| t.status())));

        timeline.start();
        timeline.advance();
        assert_eq!(seen.get(), Some(Status::Stopped));
    }

    #[test]
    fn test_late_poll_fires_once() {
        let (timeline, time) = offline("");
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        timeline.insert(0.5, move || c.set(c.get() + 1)).unwrap();
        timeline.insert(100.0, || {}).unwrap();
        timeline.start();

        time.advance(50.0);
        timeline.advance();
        timeline.advance();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_completion_called_once() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let (timeline, _) = offline("");
        let timeline = timeline.with_completion(move || c.set(c.get() + 1));

        timeline.start();
        timeline.advance();
        assert_eq!(calls.get(), 1);
        assert_eq!(timeline.status(), Status::Stopped);

        // Polling a stopped, exhausted timeline does not complete again.
        timeline.advance();
        timeline.advance();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_skip_unsupported() {
        let (timeline, _) = offline("");
        assert_eq!(timeline.skip_to(1.0).unwrap_err(), TimelineError::SeekUnsupported);
    }

    #[test]
    fn test_set_playback_rate_while_stopped() {
        let (timeline, _) = offline("");
        timeline.set_playback_rate(2.0).unwrap();
        assert_eq!(timeline.playback_rate(), 2.0);
        assert_eq!(timeline.status(), Status::Stopped);
        assert_eq!(
            timeline.set_playback_rate(0.0).unwrap_err(),
            TimelineError::InvalidPlaybackRate(0.0)
        );
        assert_eq!(timeline.playback_rate(), 2.0);
    }

    #[test]
    fn test_display() {
        let (timeline, _) = offline("");
        timeline.insert(1.0, || {}).unwrap();
        timeline.insert(1.0, || {}).unwrap();
        timeline.loop_every(0.5, 0.0, || {}).unwrap();
        assert_eq!(timeline.to_string(), "[1: 2], [0: 1]");
    }

    #[test]
    fn test_drop_with_weak_handle() {
        let (timeline, _) = offline("");
        let weak = timeline.downgrade();
        timeline.insert(0.0, move || {
            if let Some(t) = weak.upgrade() {
                t.stop();
            }
        })
        .unwrap();
        let weak = timeline.downgrade();
        drop(timeline);
        assert!(weak.upgrade().is_none());
    }
}
