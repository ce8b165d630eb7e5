//! State nodes of a built state graph.
//!
//! States are stored by value in the graph and addressed by [`StateId`].
//! A state is either a normal state, which the machine leaves through a
//! transition, or a final state, which ends the enclosing machine (or the
//! enclosing composite state when nested).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a state inside its [`StateGraph`](super::StateGraph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a state is terminal, and if so whether it marks failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateKind {
    Normal,
    Final { failure: bool },
}

/// A named node of the machine graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateNode {
    pub(crate) id: StateId,
    pub(crate) name: String,
    pub(crate) kind: StateKind,
    pub(crate) parent: Option<StateId>,
    pub(crate) children: Vec<StateId>,
}

impl StateNode {
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Display name, copied from the operation that named the state.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// Enclosing composite state, `None` at the top level.
    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    /// Nested states in creation order. The first one is entered when
    /// this state is entered.
    pub fn children(&self) -> &[StateId] {
        &self.children
    }

    pub fn is_composite(&self) -> bool {
        !self.children.is_empty()
    }

    /// Final states have no outgoing transitions.
    pub fn is_final(&self) -> bool {
        matches!(self.kind, StateKind::Final { .. })
    }

    /// Final state reached when the script fails.
    pub fn is_failure(&self) -> bool {
        matches!(self.kind, StateKind::Final { failure: true })
    }
}
