//! Sub-schedules
//!
//! Two stores of pending batches sharing one interface:
//! - `AtomicSchedule`: consumption moves a cursor forward; batches are kept.
//! - `LoopingSchedule`: consumption removes the soonest batch and re-inserts each
//!   of its actions `interval` seconds later.

use crate::action::Action;
use crate::store::{Batch, BatchStore, Offset};

/// Interface shared by the atomic and looping stores.
pub trait SubSchedule {
    /// Append `action` to the batch at `offset`.
    fn insert(&mut self, action: Action, offset: Offset);

    /// Drop actions tagged with any of `identifiers` (all actions if empty).
    /// Returns the number of actions removed.
    fn remove_all<S: AsRef<str>>(&mut self, identifiers: &[S]) -> usize;

    /// The soonest batch not yet consumed.
    fn next(&self) -> Option<(Offset, &Batch)>;

    /// Mark the current `next` batch as consumed.
    fn advance(&mut self);

    /// Underlying storage.
    fn store(&self) -> &BatchStore;

    fn next_offset(&self) -> Option<Offset> {
        self.next().map(|(offset, _)| offset)
    }

    fn is_exhausted(&self) -> bool {
        self.next().is_none()
    }
}

/// One-shot actions. Fired batches stay in the store for inspection and are
/// skipped by a cursor.
#[derive(Debug, Default)]
pub struct AtomicSchedule {
    base: BatchStore,
    /// Last consumed offset. Everything at or before it has been consumed.
    cursor: Option<Offset>,
}

impl AtomicSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the batches of `other` into this schedule. The cursor is unchanged.
    pub fn merge(&mut self, other: AtomicSchedule) {
        self.base.merge(other.base);
    }

    /// Last consumed offset, if any.
    pub fn cursor(&self) -> Option<Offset> {
        self.cursor
    }

    /// Number of batches not yet consumed.
    pub fn remaining(&self) -> usize {
        match self.cursor {
            None => self.base.len(),
            Some(cursor) => self.base.offsets().filter(|o| *o > cursor.seconds()).count(),
        }
    }
}

impl SubSchedule for AtomicSchedule {
    fn insert(&mut self, action: Action, offset: Offset) {
        debug_assert!(!action.is_looping());
        self.base.append(offset, action);
    }

    fn remove_all<S: AsRef<str>>(&mut self, identifiers: &[S]) -> usize {
        self.base.remove_all(identifiers)
    }

    fn next(&self) -> Option<(Offset, &Batch)> {
        self.base.first_after(self.cursor)
    }

    fn advance(&mut self) {
        if let Some(offset) = self.next_offset() {
            self.cursor = Some(offset);
        }
    }

    fn store(&self) -> &BatchStore {
        &self.base
    }
}

/// Looping actions. The soonest key is always the next batch.
#[derive(Debug, Default)]
pub struct LoopingSchedule {
    base: BatchStore,
}

impl LoopingSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: LoopingSchedule) {
        self.base.merge(other.base);
    }

    /// Re-insert every action of the batch at `offset` at `offset + interval`.
    /// The batch is taken out of the map before anything is re-inserted, so the
    /// original key is gone even when an action lands back in a fresh batch.
    fn bump(&mut self, offset: Offset) {
        let Some(batch) = self.base.take(offset) else {
            return;
        };
        for action in batch {
            match action.interval() {
                Some(interval) => {
                    let next = Offset::new(offset.seconds() + interval);
                    self.base.append(next, action);
                }
                None => {
                    tracing::warn!(offset = offset.seconds(), "dropping atomic action found in looping schedule");
                }
            }
        }
    }
}

impl SubSchedule for LoopingSchedule {
    fn insert(&mut self, action: Action, offset: Offset) {
        debug_assert!(action.is_looping());
        self.base.append(offset, action);
    }

    fn remove_all<S: AsRef<str>>(&mut self, identifiers: &[S]) -> usize {
        self.base.remove_all(identifiers)
    }

    fn next(&self) -> Option<(Offset, &Batch)> {
        self.base.first()
    }

    fn advance(&mut self) {
        if let Some(offset) = self.next_offset() {
            self.bump(offset);
        }
    }

    fn store(&self) -> &BatchStore {
        &self.base
    }
}
