//! Operations: the steps of a declarative machine script.
//!
//! Each operation binds to one state of the graph. An operation either
//! shares the state of the group it was appended to, or heads a new group
//! and so starts a new state. What an operation needs from its
//! surroundings (a fresh state, a successor, a failure state) is reported
//! through [`Operation::requirements`]; operations never refer to each
//! other directly.
//!
//! # Example
//!
//! ```rust
//! use scriptstate::ops::{self, Named};
//! use std::time::Duration;
//!
//! let op = ops::expect("boot successful")
//!     .within(Duration::from_millis(1000))
//!     .named("s_boot");
//!
//! assert_eq!(op.name(), Some("s_boot"));
//! assert!(op.requirements().needs_next);
//! assert!(op.requirements().needs_failure);
//! ```

mod delay;
mod expect;
mod send;
mod terminal;

pub use delay::Delay;
pub use expect::Expect;
pub use send::Send;
pub use terminal::Terminal;

use crate::builder::{BuildContext, BuildError, Parameters};
use crate::core::{StateId, StateKind};
use std::time::Duration;

/// Structural needs an operation reports to the builder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Requirements {
    /// Always starts a fresh state.
    pub must_be_new: bool,
    /// Targets the implicit successor state.
    pub needs_next: bool,
    /// Targets the implicit failure state.
    pub needs_failure: bool,
}

/// Explicit destination of a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A state that has already been built.
    State(StateId),
    /// A state looked up by name once every state of the flush exists.
    Named(String),
}

impl From<StateId> for Target {
    fn from(id: StateId) -> Self {
        Target::State(id)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Named(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Named(name)
    }
}

/// Kind-specific payload of an operation.
#[derive(Clone, Debug)]
pub enum OpKind {
    Send(Send),
    Expect(Expect),
    Delay(Delay),
    Terminal(Terminal),
}

/// One step of a machine script.
#[derive(Clone, Debug)]
pub struct Operation {
    name: Option<String>,
    kind: OpKind,
}

impl Operation {
    pub fn new(kind: OpKind) -> Self {
        Self { name: None, kind }
    }

    /// Name copied onto the state the operation binds to.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            OpKind::Send(_) => "Send",
            OpKind::Expect(_) => "Expect",
            OpKind::Delay(_) => "Delay",
            OpKind::Terminal(_) => "Terminal",
        }
    }

    pub fn requirements(&self) -> Requirements {
        match &self.kind {
            OpKind::Send(op) => op.requirements(),
            OpKind::Expect(op) => op.requirements(),
            OpKind::Delay(op) => op.requirements(),
            OpKind::Terminal(op) => op.requirements(),
        }
    }

    /// Kind of the state this operation creates when it heads a group.
    pub(crate) fn state_kind(&self) -> StateKind {
        match &self.kind {
            OpKind::Terminal(op) => StateKind::Final {
                failure: op.is_failure(),
            },
            _ => StateKind::Normal,
        }
    }

    /// Check everything the operation will need from the parameters,
    /// before any state is created.
    pub(crate) fn preflight(&self, params: &Parameters) -> Result<(), BuildError> {
        match &self.kind {
            OpKind::Send(_) | OpKind::Expect(_) => {
                params.require_channel(self.label()).map(|_| ())
            }
            OpKind::Delay(_) | OpKind::Terminal(_) => Ok(()),
        }
    }

    /// Wire the operation into the state current in `ctx`.
    pub(crate) fn build(&self, ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
        match &self.kind {
            OpKind::Send(op) => op.build(ctx),
            OpKind::Expect(op) => op.build(ctx),
            OpKind::Delay(op) => op.build(ctx),
            OpKind::Terminal(_) => Ok(()),
        }
    }
}

/// Attach a state name to anything convertible into an [`Operation`].
pub trait Named: Into<Operation> {
    fn named(self, name: impl Into<String>) -> Operation {
        let mut op = self.into();
        op.name = Some(name.into());
        op
    }
}

impl<T: Into<Operation>> Named for T {}

impl From<Send> for Operation {
    fn from(op: Send) -> Self {
        Operation::new(OpKind::Send(op))
    }
}

impl From<Expect> for Operation {
    fn from(op: Expect) -> Self {
        Operation::new(OpKind::Expect(op))
    }
}

impl From<Delay> for Operation {
    fn from(op: Delay) -> Self {
        Operation::new(OpKind::Delay(op))
    }
}

impl From<Terminal> for Operation {
    fn from(op: Terminal) -> Self {
        Operation::new(OpKind::Terminal(op))
    }
}

/// Write `data` to the configured channel on entry.
pub fn send(data: impl Into<Vec<u8>>) -> Send {
    Send::new(data)
}

/// Wait for a line containing `pattern` on the configured channel.
pub fn expect(pattern: impl Into<Vec<u8>>) -> Expect {
    Expect::new(pattern)
}

/// Move on after `after` has elapsed in the state.
pub fn delay(after: Duration) -> Delay {
    Delay::new(after)
}

/// End the script in a fresh final state.
pub fn terminal() -> Terminal {
    Terminal::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_sets_state_name() {
        let op = send("x").named("s_send");
        assert_eq!(op.name(), Some("s_send"));
        assert_eq!(op.label(), "Send");

        let renamed = op.named("s_other");
        assert_eq!(renamed.name(), Some("s_other"));
    }

    #[test]
    fn requirements_follow_variant_defaults() {
        let send_op: Operation = send("x").into();
        assert_eq!(send_op.requirements(), Requirements::default());

        let wait: Operation = expect("ok").into();
        assert_eq!(
            wait.requirements(),
            Requirements {
                must_be_new: false,
                needs_next: true,
                needs_failure: false,
            }
        );

        let pause: Operation = delay(Duration::from_millis(10)).into();
        assert!(pause.requirements().needs_next);

        let end: Operation = terminal().into();
        assert!(end.requirements().must_be_new);
    }

    #[test]
    fn terminal_decides_state_kind() {
        let ok: Operation = terminal().into();
        let failed: Operation = terminal().failure().into();
        let other: Operation = send("x").into();

        assert_eq!(ok.state_kind(), StateKind::Final { failure: false });
        assert_eq!(failed.state_kind(), StateKind::Final { failure: true });
        assert_eq!(other.state_kind(), StateKind::Normal);
    }

    #[test]
    fn targets_convert_from_names_and_ids() {
        assert_eq!(Target::from("s_ok"), Target::Named("s_ok".to_string()));
        assert_eq!(Target::from(StateId(2)), Target::State(StateId(2)));
    }
}
