//! Rust Timeline
//!
//! A frame-quantized scheduler for closures placed at offsets in time:
//! - One-shot (atomic) and repeating (looping) actions, tagged for bulk removal
//! - Play / pause / resume / stop with a variable playback rate
//! - Due times compared in whole frames, fired one batch per poll
//! - Dual execution modes: realtime (spin_sleep) and offline (virtual time)

pub mod action;
pub mod clock;
pub mod error;
pub mod frames;
pub mod schedule;
pub mod store;
pub mod sub_schedule;
pub mod ticker;
pub mod timeline;


pub use action::{Action, Operation};
pub use clock::{Clock, ManualClock, ManualTime, MonotonicClock};
pub use error::{TimelineError, TimelineResult};
pub use frames::{frames, Frames, Playhead};
pub use schedule::{NextBatch, Schedule};
pub use store::{Batch, BatchStore, Offset};
pub use sub_schedule::{AtomicSchedule, LoopingSchedule, SubSchedule};
pub use ticker::{ManualTicker, SpinTicker, Ticker};
pub use timeline::{Status, Timeline, TimelineConfig, WeakTimeline};
