//! Guard predicates for controlling transitions.
//!
//! A guard is attached to a transition and evaluated only when the
//! transition's trigger fires. The transition is taken only if the guard
//! holds.

use crate::channel::{contains_pattern, ByteChannel};
use std::fmt;
use std::rc::Rc;

/// Predicate evaluated when a transition's trigger fires.
///
/// # Example
///
/// ```rust
/// use scriptstate::core::Guard;
///
/// let always = Guard::new("always", || true);
/// assert!(always.check());
/// assert_eq!(always.label(), "always");
/// ```
#[derive(Clone)]
pub struct Guard {
    label: String,
    predicate: Rc<dyn Fn() -> bool>,
}

impl Guard {
    /// Create a guard from a predicate and a label used in summaries and logs.
    pub fn new<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        Guard {
            label: label.into(),
            predicate: Rc::new(predicate),
        }
    }

    /// Guard that holds when a freshly drained line of `channel` contains
    /// `needle`.
    ///
    /// Checking the guard consumes every complete line queued on the
    /// channel, see [`contains_pattern`].
    pub fn line_contains(channel: ByteChannel, needle: Vec<u8>) -> Self {
        let label = format!("line contains {:?}", String::from_utf8_lossy(&needle));
        Guard::new(label, move || contains_pattern(&channel, &needle))
    }

    pub fn check(&self) -> bool {
        (self.predicate)()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("label", &self.label).finish()
    }
}
