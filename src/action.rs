//! Actions - tagged units of work
//!
//! An action pairs an operation with a list of identifier tags. Atomic actions
//! fire once; looping actions are re-scheduled `interval` seconds after each firing.

use crate::error::{is_positive, TimelineError, TimelineResult};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a zero-argument operation.
///
/// Cloning the handle does not clone the closure, so the poll cycle can take a
/// snapshot of due operations and run them without holding any borrow of the
/// schedule that owns them.
#[derive(Clone)]
pub struct Operation(Rc<RefCell<dyn FnMut()>>);

impl Operation {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() + 'static,
    {
        Self(Rc::new(RefCell::new(f)))
    }

    /// Run the operation. Returns false if it is already running further up the
    /// stack (an operation that re-enters its own timeline) and was skipped.
    pub fn perform(&self) -> bool {
        match self.0.try_borrow_mut() {
            Ok(mut f) => {
                (*f)();
                true
            }
            Err(_) => false,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Operation")
    }
}

/// Operation to be performed, with identifiers.
#[derive(Debug)]
pub enum Action {
    /// Fires once at its offset.
    Atomic {
        identifiers: Vec<String>,
        operation: Operation,
    },
    /// Fires at its offset, then again every `interval` seconds.
    Looping {
        identifiers: Vec<String>,
        operation: Operation,
        interval: f64,
    },
}

impl Action {
    /// Create an atomic action.
    pub fn atomic(identifiers: Vec<String>, operation: Operation) -> Self {
        Action::Atomic {
            identifiers,
            operation,
        }
    }

    /// Create a looping action repeating every `interval` seconds.
    pub fn looping(
        interval: f64,
        identifiers: Vec<String>,
        operation: Operation,
    ) -> TimelineResult<Self> {
        if !is_positive(interval) {
            return Err(TimelineError::NonPositiveInterval(interval));
        }
        Ok(Action::Looping {
            identifiers,
            operation,
            interval,
        })
    }

    pub fn identifiers(&self) -> &[String] {
        match self {
            Action::Atomic { identifiers, .. } | Action::Looping { identifiers, .. } => identifiers,
        }
    }

    pub fn operation(&self) -> &Operation {
        match self {
            Action::Atomic { operation, .. } | Action::Looping { operation, .. } => operation,
        }
    }

    /// Loop interval, or None for atomic actions.
    pub fn interval(&self) -> Option<f64> {
        match self {
            Action::Atomic { .. } => None,
            Action::Looping { interval, .. } => Some(*interval),
        }
    }

    pub fn is_looping(&self) -> bool {
        matches!(self, Action::Looping { .. })
    }

    /// Append a tag. Duplicates are allowed.
    pub fn add_identifier(&mut self, identifier: impl Into<String>) {
        match self {
            Action::Atomic { identifiers, .. } | Action::Looping { identifiers, .. } => {
                identifiers.push(identifier.into())
            }
        }
    }

    pub fn has_identifier(&self, identifier: &str) -> bool {
        self.identifiers().iter().any(|id| id == identifier)
    }

    /// True if any of `identifiers` is one of this action's tags.
    pub fn has_any_identifiers<S: AsRef<str>>(&self, identifiers: &[S]) -> bool {
        identifiers.iter().any(|id| self.has_identifier(id.as_ref()))
    }

    pub fn perform(&self) -> bool {
        self.operation().perform()
    }
}
