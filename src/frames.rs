//! Frame math - scheduled time to frame conversion
//!
//! Offsets are compared against the playhead in whole frames. A playback rate
//! change pivots on `last_paused_date`: time scheduled before the pivot keeps the
//! frames it already had, only time after it is stretched by the new rate.

use crate::error::{is_positive, TimelineError, TimelineResult};

/// Quantization of seconds by the frame rate.
pub type Frames = u64;

/// Convert a scheduled date (seconds) into frames.
///
/// `rate` is seconds per frame. Time up to `last_paused_date` counts at the
/// nominal frame rate, time after it at `playback_rate` times that rate. Dates
/// at or before the pivot map to frame 0.
pub fn frames(scheduled_date: f64, last_paused_date: f64, rate: f64, playback_rate: f64) -> Frames {
    let frames_per_second = 1.0 / rate;
    let since_pivot = scheduled_date - last_paused_date;
    if since_pivot <= 0.0 {
        return 0;
    }
    let playback_interval = frames_per_second / playback_rate;
    (last_paused_date * frames_per_second + playback_interval * since_pivot).round() as Frames
}

/// Frame rate, playback rate, and the pause pivot of a timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Playhead {
    /// Seconds per frame.
    rate: f64,
    playback_rate: f64,
    /// Scheduled time accumulated across pauses, in seconds.
    last_paused_date: f64,
}

impl Playhead {
    pub fn new(rate: f64, playback_rate: f64) -> TimelineResult<Self> {
        if !is_positive(rate) {
            return Err(TimelineError::InvalidRate(rate));
        }
        if !is_positive(playback_rate) {
            return Err(TimelineError::InvalidPlaybackRate(playback_rate));
        }
        Ok(Self {
            rate,
            playback_rate,
            last_paused_date: 0.0,
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn last_paused_date(&self) -> f64 {
        self.last_paused_date
    }

    pub fn set_playback_rate(&mut self, playback_rate: f64) -> TimelineResult<()> {
        if !is_positive(playback_rate) {
            return Err(TimelineError::InvalidPlaybackRate(playback_rate));
        }
        self.playback_rate = playback_rate;
        Ok(())
    }

    /// Back to the beginning of scheduled time.
    pub fn reset(&mut self) {
        self.last_paused_date = 0.0;
    }

    /// Fold `elapsed` wall seconds, scaled by the playback rate, into the pivot.
    /// Returns the new pivot.
    pub fn pause(&mut self, elapsed: f64) -> f64 {
        self.last_paused_date += elapsed.max(0.0) * self.playback_rate;
        self.last_paused_date
    }

    /// Frame at which an action scheduled at `offset` becomes due.
    pub fn due_frame(&self, offset: f64) -> Frames {
        frames(offset, self.last_paused_date, self.rate, self.playback_rate)
    }

    /// Frame the playhead has reached after `elapsed` wall seconds since the
    /// last start or resume. The playhead always moves at rate 1; only the due
    /// frames are scaled by the playback rate.
    pub fn current_frame(&self, elapsed: f64) -> Frames {
        frames(
            elapsed + self.last_paused_date,
            self.last_paused_date,
            self.rate,
            1.0,
        )
    }

    pub fn is_due(&self, offset: f64, elapsed: f64) -> bool {
        self.current_frame(elapsed) >= self.due_frame(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_frame_calculation_playback_rate_of_one() {
        assert_eq!(frames(2.0, 0.0, 1.0 / 120.0, 1.0), 240);
    }

    #[test]
    fn test_frame_calculation_playback_rate_changed() {
        // Event at 2s, playback rate doubled at 1s.
        assert_eq!(frames(2.0, 1.0, 1.0 / 120.0, 2.0), 180);
    }

    #[test]
    fn test_frames_before_pivot_are_zero() {
        assert_eq!(frames(0.5, 1.0, 1.0 / 60.0, 1.0), 0);
        assert_eq!(frames(1.0, 1.0, 1.0 / 60.0, 1.0), 0);
        assert_eq!(frames(0.0, 0.0, 1.0 / 60.0, 1.0), 0);
    }

    #[test]
    fn test_playhead_rejects_bad_rates() {
        assert_eq!(Playhead::new(0.0, 1.0).unwrap_err(), TimelineError::InvalidRate(0.0));
        assert_eq!(
            Playhead::new(1.0 / 120.0, -2.0).unwrap_err(),
            TimelineError::InvalidPlaybackRate(-2.0)
        );
        let mut p = Playhead::new(1.0 / 120.0, 1.0).unwrap();
        assert!(p.set_playback_rate(f64::NAN).is_err());
        assert_eq!(p.playback_rate(), 1.0);
    }

    #[test]
    fn test_current_frame_ignores_playback_rate() {
        let p = Playhead::new(1.0 / 120.0, 4.0).unwrap();
        assert_eq!(p.current_frame(1.0), 120);
        // At 4x, an event at 2s is due after half a second.
        assert_eq!(p.due_frame(2.0), 60);
        assert!(p.is_due(2.0, 0.5));
        assert!(!p.is_due(2.0, 0.49));
    }

    #[test]
    fn test_pause_pivot_keeps_elapsed_frames() {
        let mut p = Playhead::new(1.0 / 120.0, 1.0).unwrap();
        // Played one second at 1x, then switch to 2x.
        assert_eq!(p.pause(1.0), 1.0);
        p.set_playback_rate(2.0).unwrap();

        // Resumed: the playhead restarts at the pivot's frame.
        assert_eq!(p.current_frame(0.0), 0);
        assert_eq!(p.current_frame(0.5), 180);
        // 2s is one scheduled second past the pivot: half a wall second at 2x.
        assert_eq!(p.due_frame(2.0), 180);
        assert!(p.is_due(2.0, 0.5));

        p.reset();
        assert_eq!(p.last_paused_date(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_due_frame_monotonic(
            a in -10.0f64..1000.0,
            b in -10.0f64..1000.0,
            pivot in 0.0f64..100.0,
            fps in 1.0f64..1000.0,
            playback in 0.01f64..16.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let rate = 1.0 / fps;
            prop_assert!(frames(lo, pivot, rate, playback) <= frames(hi, pivot, rate, playback));
        }
    }
}
