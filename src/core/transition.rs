//! Transitions, timers and entry actions of a state graph.

use super::guard::Guard;
use super::state::StateId;
use crate::channel::{ByteChannel, ChannelError, ChannelId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Index of a single-shot timer inside its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub(crate) usize);

/// Event that makes a transition eligible to fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// New bytes arrived on the channel.
    DataArrived(ChannelId),
    /// The timer expired.
    Timer(TimerId),
    /// A nested child of the source state reached a final state.
    Finished,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataArrived(channel) => write!(f, "data arrived on {channel}"),
            Self::Timer(timer) => write!(f, "timer {}", timer.0),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Edge of the state graph.
#[derive(Clone, Debug)]
pub struct Transition {
    pub source: StateId,
    pub target: StateId,
    pub trigger: Trigger,
    pub guard: Option<Guard>,
}

impl Transition {
    /// Evaluate the guard, if any. Only called once the trigger fired.
    pub fn can_fire(&self) -> bool {
        self.guard.as_ref().is_none_or(|g| g.check())
    }
}

/// Single-shot timer started on entry of `state` and cancelled on exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerSpec {
    pub state: StateId,
    pub after: Duration,
}

/// Side effect run when a state is entered.
#[derive(Clone, Debug)]
pub enum Action {
    Write { channel: ByteChannel, data: Vec<u8> },
}

impl Action {
    pub fn run(&self) -> Result<(), ChannelError> {
        match self {
            Self::Write { channel, data } => channel.write(data).map(|_| ()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EntryAction {
    pub state: StateId,
    pub action: Action,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::OpenMode;

    #[test]
    fn unguarded_transition_always_fires() {
        let transition = Transition {
            source: StateId(0),
            target: StateId(1),
            trigger: Trigger::Finished,
            guard: None,
        };

        assert!(transition.can_fire());
    }

    #[test]
    fn guard_blocks_transition() {
        let transition = Transition {
            source: StateId(0),
            target: StateId(1),
            trigger: Trigger::Timer(TimerId(0)),
            guard: Some(Guard::new("never", || false)),
        };

        assert!(!transition.can_fire());
    }

    #[test]
    fn write_action_reaches_peer() {
        let (tx, rx) = ByteChannel::pair();
        let action = Action::Write {
            channel: tx,
            data: b"hi\n".to_vec(),
        };

        action.run().unwrap();
        assert_eq!(rx.read_line(), Some(b"hi\n".to_vec()));
    }

    #[test]
    fn write_action_reports_closed_channel() {
        let action = Action::Write {
            channel: ByteChannel::new(OpenMode::ReadOnly),
            data: b"x".to_vec(),
        };

        assert!(action.run().is_err());
    }
}
