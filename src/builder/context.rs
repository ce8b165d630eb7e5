//! Per-group view of the graph handed to operations while they build.

use super::{BuildError, Parameters};
use crate::channel::ByteChannel;
use crate::core::{Action, Guard, StateGraph, StateId, TimerId, Transition, Trigger};
use crate::ops::Target;
use std::time::Duration;

/// Resolution frame for one nesting depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Level {
    /// Enclosing composite state, `None` at the top level.
    pub parent: Option<StateId>,
    /// First state of the previous flush; successor of the last group of the
    /// next flush.
    pub next: Option<StateId>,
    /// Designated failure terminal.
    pub failure: Option<StateId>,
}

impl Level {
    pub fn nested(parent: StateId) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }
}

pub(crate) fn resolve_target(graph: &StateGraph, target: &Target) -> Result<StateId, BuildError> {
    match target {
        Target::State(id) if id.index() < graph.len() => Ok(*id),
        Target::State(id) => Err(BuildError::UnknownState {
            name: id.to_string(),
        }),
        Target::Named(name) => graph
            .find(name)
            .ok_or_else(|| BuildError::UnknownState { name: name.clone() }),
    }
}

/// What an operation sees while it wires itself into its group's state.
pub(crate) struct BuildContext<'a> {
    graph: &'a mut StateGraph,
    params: &'a Parameters,
    state: StateId,
    next: Option<StateId>,
    failure: Option<StateId>,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(
        graph: &'a mut StateGraph,
        params: &'a Parameters,
        state: StateId,
        next: Option<StateId>,
        failure: Option<StateId>,
    ) -> Self {
        Self {
            graph,
            params,
            state,
            next,
            failure,
        }
    }

    pub(crate) fn channel(&self, op: &'static str) -> Result<ByteChannel, BuildError> {
        self.params.require_channel(op)
    }

    pub(crate) fn resolve(&self, target: &Target) -> Result<StateId, BuildError> {
        resolve_target(self.graph, target)
    }

    /// Explicit target if given, otherwise the successor state.
    pub(crate) fn resolve_next(
        &self,
        explicit: Option<&Target>,
        op: &'static str,
    ) -> Result<StateId, BuildError> {
        match explicit {
            Some(target) => self.resolve(target),
            None => self.next.ok_or_else(|| BuildError::UnresolvedSuccessor {
                op,
                state: self.state_name(),
            }),
        }
    }

    /// Explicit target if given, otherwise the failure state.
    pub(crate) fn resolve_failure(
        &self,
        explicit: Option<&Target>,
        op: &'static str,
    ) -> Result<StateId, BuildError> {
        match explicit {
            Some(target) => self.resolve(target),
            None => self.failure.ok_or_else(|| BuildError::UnresolvedFailure {
                op,
                state: self.state_name(),
            }),
        }
    }

    pub(crate) fn add_transition(&mut self, target: StateId, trigger: Trigger, guard: Option<Guard>) {
        self.graph.add_transition(Transition {
            source: self.state,
            target,
            trigger,
            guard,
        });
    }

    pub(crate) fn add_timer(&mut self, after: Duration) -> TimerId {
        self.graph.add_timer(self.state, after)
    }

    pub(crate) fn add_entry_action(&mut self, action: Action) {
        self.graph.add_entry_action(self.state, action);
    }

    pub(crate) fn watch_channel(&mut self, channel: &ByteChannel) {
        self.graph.register_channel(channel);
    }

    fn state_name(&self) -> String {
        self.graph.state(self.state).name().to_string()
    }
}
