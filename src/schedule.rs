//! Schedule
//!
//! Merges the atomic and looping sub-schedules into a single "next batch" view.
//! When both have a batch at the same minimal offset, both contribute to it and
//! both are advanced together.

use crate::action::{Action, Operation};
use crate::error::{TimelineError, TimelineResult};
use crate::store::Offset;
use crate::sub_schedule::{AtomicSchedule, LoopingSchedule, SubSchedule};
use std::fmt;

/// The soonest pending offset and every action due there.
///
/// Atomic actions come before looping ones, but callers should not rely on
/// the relative order of the two categories.
#[derive(Debug)]
pub struct NextBatch<'a> {
    pub offset: f64,
    pub actions: Vec<&'a Action>,
}

impl NextBatch<'_> {
    /// Handles to the due operations, in batch order.
    pub fn operations(&self) -> Vec<Operation> {
        self.actions.iter().map(|a| a.operation().clone()).collect()
    }
}

/// Which sub-schedules hold the soonest batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Due {
    offset: Offset,
    atomic: bool,
    looping: bool,
}

/// Schedule of atomic and looping actions.
#[derive(Debug, Default)]
pub struct Schedule {
    atomic: AtomicSchedule,
    looping: LoopingSchedule,
}

fn check_offset(offset: f64) -> TimelineResult<Offset> {
    if offset.is_finite() {
        Ok(Offset::new(offset))
    } else {
        Err(TimelineError::InvalidOffset(offset))
    }
}

impl Schedule {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `operation` to be performed once at `offset` seconds.
    pub fn insert<F>(&mut self, offset: f64, identifiers: Vec<String>, operation: F) -> TimelineResult<()>
    where
        F: FnMut() + 'static,
    {
        let offset = check_offset(offset)?;
        let action = Action::atomic(identifiers, Operation::new(operation));
        self.atomic.insert(action, offset);
        Ok(())
    }

    /// Schedule `operation` to be performed every `interval` seconds, starting at
    /// `start_offset`.
    pub fn loop_every<F>(
        &mut self,
        interval: f64,
        start_offset: f64,
        identifiers: Vec<String>,
        operation: F,
    ) -> TimelineResult<()>
    where
        F: FnMut() + 'static,
    {
        let offset = check_offset(start_offset)?;
        let action = Action::looping(interval, identifiers, Operation::new(operation))?;
        self.looping.insert(action, offset);
        Ok(())
    }

    /// Move the contents of `other` into this schedule.
    pub fn insert_contents_of(&mut self, other: Schedule) {
        self.atomic.merge(other.atomic);
        self.looping.merge(other.looping);
    }

    /// Remove every action tagged with any of `identifiers`, or every action
    /// if `identifiers` is empty. Returns the number removed.
    pub fn remove_all<S: AsRef<str>>(&mut self, identifiers: &[S]) -> usize {
        self.looping.remove_all(identifiers) + self.atomic.remove_all(identifiers)
    }

    /// Like `remove_all`, restricted to atomic actions.
    pub fn remove_all_atomic<S: AsRef<str>>(&mut self, identifiers: &[S]) -> usize {
        self.atomic.remove_all(identifiers)
    }

    /// Like `remove_all`, restricted to looping actions.
    pub fn remove_all_looping<S: AsRef<str>>(&mut self, identifiers: &[S]) -> usize {
        self.looping.remove_all(identifiers)
    }

    fn due(&self) -> Option<Due> {
        let a = self.atomic.next_offset();
        let l = self.looping.next_offset();
        let offset = match (a, l) {
            (None, None) => return None,
            (Some(a), None) => a,
            (None, Some(l)) => l,
            (Some(a), Some(l)) => a.min(l),
        };
        Some(Due {
            offset,
            atomic: a == Some(offset),
            looping: l == Some(offset),
        })
    }

    /// Soonest offset with pending actions.
    pub fn next_offset(&self) -> Option<f64> {
        self.due().map(|d| d.offset.seconds())
    }

    /// The soonest batch across both sub-schedules, or None when both are
    /// exhausted.
    pub fn next(&self) -> Option<NextBatch<'_>> {
        let due = self.due()?;
        let mut actions = Vec::new();
        if due.atomic {
            if let Some((_, batch)) = self.atomic.next() {
                actions.extend(batch.iter());
            }
        }
        if due.looping {
            if let Some((_, batch)) = self.looping.next() {
                actions.extend(batch.iter());
            }
        }
        Some(NextBatch {
            offset: due.offset.seconds(),
            actions,
        })
    }

    /// Advance exactly the sub-schedules that contributed to `next`. A
    /// sub-schedule whose next batch is later is left alone.
    pub fn advance(&mut self) {
        let Some(due) = self.due() else {
            return;
        };
        if due.atomic {
            self.atomic.advance();
        }
        if due.looping {
            self.looping.advance();
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.due().is_none()
    }

    pub fn atomic(&self) -> &AtomicSchedule {
        &self.atomic
    }

    pub fn looping(&self) -> &LoopingSchedule {
        &self.looping
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.atomic.store(), self.looping.store())
    }
}
