//! State transition history tracking.
//!
//! Provides immutable tracking of the transitions a running machine took,
//! stamped with both wall-clock time and the scheduler's virtual time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single fired transition.
///
/// # Example
///
/// ```rust
/// use scriptstate::core::StateTransition;
/// use chrono::Utc;
/// use std::time::Duration;
///
/// let transition = StateTransition {
///     from: "s_boot".to_string(),
///     to: "s_send".to_string(),
///     trigger: "line contains \"boot successful\"".to_string(),
///     timestamp: Utc::now(),
///     at: Duration::from_millis(500),
/// };
/// assert_eq!(transition.to, "s_send");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Name of the innermost state left
    pub from: String,
    /// Name of the state entered
    pub to: String,
    /// What fired the transition
    pub trigger: String,
    /// Wall-clock time of the transition
    pub timestamp: DateTime<Utc>,
    /// Scheduler time of the transition
    pub at: Duration,
}

/// Ordered history of fired transitions.
///
/// History is immutable - the `record` method returns a new history
/// with the transition added.
///
/// # Example
///
/// ```rust
/// use scriptstate::core::{StateHistory, StateTransition};
/// use chrono::Utc;
/// use std::time::Duration;
///
/// let step = |from: &str, to: &str, ms: u64| StateTransition {
///     from: from.to_string(),
///     to: to.to_string(),
///     trigger: "finished".to_string(),
///     timestamp: Utc::now(),
///     at: Duration::from_millis(ms),
/// };
///
/// let history = StateHistory::new()
///     .record(step("start", "middle", 0))
///     .record(step("middle", "end", 40));
///
/// assert_eq!(history.get_path(), vec!["start", "middle", "end"]);
/// assert_eq!(history.elapsed(), Some(Duration::from_millis(40)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    transitions: Vec<StateTransition>,
}

impl StateHistory {
    /// Create a new empty history.
    pub fn new() -> Self {
        Self {
            transitions: Vec::new(),
        }
    }

    /// Record a transition, returning a new history.
    ///
    /// This does not mutate the existing history. Every call copies the
    /// transitions recorded so far, so a machine looping for a long time
    /// pays time and memory proportional to its whole history per step.
    pub fn record(&self, transition: StateTransition) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Names of the states traversed: the first source, then every target.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(first.from.as_str());
        }
        for transition in &self.transitions {
            path.push(transition.to.as_str());
        }
        path
    }

    /// Wall-clock duration from the first to the last transition.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Scheduler time from the first to the last transition.
    pub fn elapsed(&self) -> Option<Duration> {
        let first = self.transitions.first()?;
        let last = self.transitions.last()?;
        Some(last.at.saturating_sub(first.at))
    }

    /// Get all transitions in order.
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(from: &str, to: &str, at_ms: u64) -> StateTransition {
        StateTransition {
            from: from.to_string(),
            to: to.to_string(),
            trigger: "finished".to_string(),
            timestamp: Utc::now(),
            at: Duration::from_millis(at_ms),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = StateHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
        assert!(history.elapsed().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let history = StateHistory::new();

        let new_history = history.record(transition("a", "b", 0));

        assert_eq!(history.transitions().len(), 0);
        assert_eq!(new_history.transitions().len(), 1);
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let history = StateHistory::new()
            .record(transition("s_init", "s_booting", 0))
            .record(transition("s_booting", "s_firmware", 500));

        assert_eq!(history.get_path(), vec!["s_init", "s_booting", "s_firmware"]);
    }

    #[test]
    fn elapsed_uses_scheduler_time() {
        let history = StateHistory::new()
            .record(transition("a", "b", 100))
            .record(transition("b", "c", 1100));

        assert_eq!(history.elapsed(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn duration_calculates_wall_clock_time() {
        let history = StateHistory::new().record(transition("a", "b", 0));
        std::thread::sleep(Duration::from_millis(10));
        let history = history.record(transition("b", "c", 0));

        let duration = history.duration();
        assert!(duration.is_some());
        assert!(duration.unwrap() >= Duration::from_millis(10));
    }

    #[test]
    fn history_serializes_correctly() {
        let history = StateHistory::new().record(transition("a", "b", 7));

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: StateHistory = serde_json::from_str(&json).unwrap();

        assert_eq!(history, deserialized);
    }
}
