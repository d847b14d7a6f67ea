//! Ordered batch storage
//!
//! A `BTreeMap` from offset (seconds) to the batch of actions registered there.
//! Offsets use `f64::total_cmp` so the ordering is total and deterministic.
//! A key never maps to an empty batch: removal that empties a batch deletes the key.

use crate::action::Action;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Offset in scheduled time, in seconds, usable as an ordered map key.
#[derive(Clone, Copy, Debug)]
pub struct Offset(f64);

impl Offset {
    pub fn new(seconds: f64) -> Self {
        // -0.0 and 0.0 share a key.
        Offset(seconds + 0.0)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl PartialEq for Offset {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Offset {}

impl PartialOrd for Offset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Offset {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Actions sharing one offset, in insertion order.
pub type Batch = Vec<Action>;

/// Offset-ordered map of non-empty batches.
#[derive(Debug, Default)]
pub struct BatchStore {
    base: BTreeMap<Offset, Batch>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self {
            base: BTreeMap::new(),
        }
    }

    /// Append an action to the batch at `offset`, creating the batch if absent.
    pub fn append(&mut self, offset: Offset, action: Action) {
        self.base.entry(offset).or_default().push(action);
    }

    /// Move every batch of `other` into this store. Colliding offsets append
    /// `other`'s actions after the existing ones.
    pub fn merge(&mut self, other: BatchStore) {
        for (offset, batch) in other.base {
            self.base.entry(offset).or_default().extend(batch);
        }
    }

    /// Drop every action tagged with any of `identifiers`, or every action if
    /// `identifiers` is empty. Returns the number of actions removed.
    pub fn remove_all<S: AsRef<str>>(&mut self, identifiers: &[S]) -> usize {
        let before = self.action_count();
        if identifiers.is_empty() {
            self.base.clear();
            return before;
        }
        self.base.retain(|_, batch| {
            batch.retain(|action| !action.has_any_identifiers(identifiers));
            !batch.is_empty()
        });
        before - self.action_count()
    }

    /// Smallest offset and its batch.
    pub fn first(&self) -> Option<(Offset, &Batch)> {
        self.base.iter().next().map(|(o, b)| (*o, b))
    }

    /// Smallest offset strictly greater than `after` (or the smallest overall).
    pub fn first_after(&self, after: Option<Offset>) -> Option<(Offset, &Batch)> {
        match after {
            None => self.first(),
            Some(after) => self
                .base
                .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
                .next()
                .map(|(o, b)| (*o, b)),
        }
    }

    /// Remove and return the batch at `offset`.
    pub fn take(&mut self, offset: Offset) -> Option<Batch> {
        self.base.remove(&offset)
    }

    pub fn get(&self, offset: Offset) -> Option<&Batch> {
        self.base.get(&offset)
    }

    /// Offsets in increasing order.
    pub fn offsets(&self) -> impl Iterator<Item = f64> + '_ {
        self.base.keys().map(|o| o.seconds())
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn action_count(&self) -> usize {
        self.base.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }
}

impl fmt::Display for BatchStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (offset, batch)) in self.base.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", offset.seconds(), batch.len())?;
        }
        write!(f, "]")
    }
}
