//! The state graph produced by the builder and driven by the runtime.

use super::state::{StateId, StateKind, StateNode};
use super::transition::{Action, EntryAction, TimerId, TimerSpec, Transition, Trigger};
use crate::channel::ByteChannel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// States, transitions, timers and entry actions of one machine.
///
/// Everything is stored by value in append-only vectors and addressed by
/// index. Composite states keep the ids of their children; children keep
/// the id of their parent.
#[derive(Clone, Debug, Default)]
pub struct StateGraph {
    states: Vec<StateNode>,
    transitions: Vec<Transition>,
    timers: Vec<TimerSpec>,
    entry_actions: Vec<EntryAction>,
    channels: Vec<ByteChannel>,
}

/// Sizes of a graph at one point in time, used to roll back a failed flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GraphMark {
    states: usize,
    transitions: usize,
    timers: usize,
    entry_actions: usize,
    channels: usize,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[StateNode] {
        &self.states
    }

    pub fn state(&self, id: StateId) -> &StateNode {
        &self.states[id.0]
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn timer(&self, id: TimerId) -> TimerSpec {
        self.timers[id.0]
    }

    /// Channels referenced by data-arrival triggers.
    pub fn channels(&self) -> &[ByteChannel] {
        &self.channels
    }

    /// Look a state up by name. The earliest state wins on duplicates.
    pub fn find(&self, name: &str) -> Option<StateId> {
        self.states.iter().find(|s| s.name == name).map(|s| s.id)
    }

    /// Top-level states, in creation order.
    pub fn roots(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states
            .iter()
            .filter(|s| s.parent.is_none())
            .map(|s| s.id)
    }

    /// Outgoing transitions of `state`, in insertion order.
    pub fn transitions_from(&self, state: StateId) -> impl Iterator<Item = &Transition> + '_ {
        self.transitions.iter().filter(move |t| t.source == state)
    }

    /// Timers started when `state` is entered.
    pub fn timers_of(&self, state: StateId) -> impl Iterator<Item = (TimerId, TimerSpec)> + '_ {
        self.timers
            .iter()
            .enumerate()
            .filter(move |(_, spec)| spec.state == state)
            .map(|(i, spec)| (TimerId(i), *spec))
    }

    /// Actions run when `state` is entered, in insertion order.
    pub fn entry_actions_of(&self, state: StateId) -> impl Iterator<Item = &Action> + '_ {
        self.entry_actions
            .iter()
            .filter(move |e| e.state == state)
            .map(|e| &e.action)
    }

    /// Path from the outermost ancestor down to `state`, inclusive.
    pub fn path_to(&self, state: StateId) -> Vec<StateId> {
        let mut path = vec![state];
        let mut cursor = self.state(state).parent;
        while let Some(parent) = cursor {
            path.push(parent);
            cursor = self.state(parent).parent;
        }
        path.reverse();
        path
    }

    pub(crate) fn add_state(
        &mut self,
        name: impl Into<String>,
        kind: StateKind,
        parent: Option<StateId>,
    ) -> StateId {
        let id = StateId(self.states.len());
        self.states.push(StateNode {
            id,
            name: name.into(),
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.states[parent.0].children.push(id);
        }
        id
    }

    pub(crate) fn rename_state(&mut self, id: StateId, name: impl Into<String>) {
        self.states[id.0].name = name.into();
    }

    pub(crate) fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub(crate) fn add_timer(&mut self, state: StateId, after: Duration) -> TimerId {
        let id = TimerId(self.timers.len());
        self.timers.push(TimerSpec { state, after });
        id
    }

    pub(crate) fn add_entry_action(&mut self, state: StateId, action: Action) {
        self.entry_actions.push(EntryAction { state, action });
    }

    pub(crate) fn register_channel(&mut self, channel: &ByteChannel) {
        if !self.channels.iter().any(|c| c.same_endpoint(channel)) {
            self.channels.push(channel.clone());
        }
    }

    pub(crate) fn mark(&self) -> GraphMark {
        GraphMark {
            states: self.states.len(),
            transitions: self.transitions.len(),
            timers: self.timers.len(),
            entry_actions: self.entry_actions.len(),
            channels: self.channels.len(),
        }
    }

    /// Drop everything added after `mark`.
    pub(crate) fn truncate(&mut self, mark: GraphMark) {
        self.states.truncate(mark.states);
        for state in &mut self.states {
            state.children.retain(|c| c.0 < mark.states);
        }
        self.transitions.truncate(mark.transitions);
        self.timers.truncate(mark.timers);
        self.entry_actions.truncate(mark.entry_actions);
        self.channels.truncate(mark.channels);
    }

    /// Human-readable description of what fires `transition`.
    pub fn describe_trigger(&self, transition: &Transition) -> String {
        match transition.trigger {
            Trigger::DataArrived(_) => match &transition.guard {
                Some(guard) => guard.label().to_string(),
                None => "data arrived".to_string(),
            },
            Trigger::Timer(timer) => format!("after {}ms", self.timer(timer).after.as_millis()),
            Trigger::Finished => "finished".to_string(),
        }
    }

    /// Serializable snapshot of the graph topology.
    pub fn summary(&self) -> GraphSummary {
        let name = |id: StateId| self.state(id).name.clone();
        GraphSummary {
            states: self
                .states
                .iter()
                .map(|s| StateSummary {
                    name: s.name.clone(),
                    terminal: s.is_final(),
                    failure: s.is_failure(),
                    parent: s.parent.map(name),
                })
                .collect(),
            transitions: self
                .transitions
                .iter()
                .map(|t| TransitionSummary {
                    from: name(t.source),
                    to: name(t.target),
                    trigger: self.describe_trigger(t),
                })
                .collect(),
        }
    }
}

/// Topology of a graph, without behavior, for display layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub states: Vec<StateSummary>,
    pub transitions: Vec<TransitionSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    pub name: String,
    pub terminal: bool,
    pub failure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionSummary {
    pub from: String,
    pub to: String,
    pub trigger: String,
}

impl GraphSummary {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Transitions arriving at the named state.
    pub fn incoming(&self, state: &str) -> Vec<&TransitionSummary> {
        self.transitions.iter().filter(|t| t.to == state).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Guard;

    fn two_states() -> (StateGraph, StateId, StateId) {
        let mut graph = StateGraph::new();
        let a = graph.add_state("a", StateKind::Normal, None);
        let b = graph.add_state("b", StateKind::Final { failure: false }, None);
        (graph, a, b)
    }

    #[test]
    fn children_are_linked_both_ways() {
        let mut graph = StateGraph::new();
        let parent = graph.add_state("parent", StateKind::Normal, None);
        let child = graph.add_state("child", StateKind::Normal, Some(parent));

        assert_eq!(graph.state(parent).children(), &[child]);
        assert_eq!(graph.state(child).parent(), Some(parent));
        assert_eq!(graph.path_to(child), vec![parent, child]);
        assert_eq!(graph.roots().collect::<Vec<_>>(), vec![parent]);
    }

    #[test]
    fn truncate_rolls_back_everything() {
        let (mut graph, a, _) = two_states();
        let mark = graph.mark();

        let child = graph.add_state("child", StateKind::Normal, Some(a));
        graph.add_timer(child, Duration::from_millis(5));
        graph.add_transition(Transition {
            source: child,
            target: a,
            trigger: Trigger::Finished,
            guard: None,
        });

        graph.truncate(mark);

        assert_eq!(graph.len(), 2);
        assert!(graph.state(a).children().is_empty());
        assert!(graph.transitions().is_empty());
        assert_eq!(graph.timers_of(child).count(), 0);
    }

    #[test]
    fn find_by_name() {
        let (graph, a, b) = two_states();

        assert_eq!(graph.find("a"), Some(a));
        assert_eq!(graph.find("b"), Some(b));
        assert_eq!(graph.find("c"), None);
    }

    #[test]
    fn summary_describes_triggers() {
        let (mut graph, a, b) = two_states();
        let timer = graph.add_timer(a, Duration::from_millis(250));
        graph.add_transition(Transition {
            source: a,
            target: b,
            trigger: Trigger::Timer(timer),
            guard: None,
        });
        graph.add_transition(Transition {
            source: a,
            target: b,
            trigger: Trigger::Finished,
            guard: Some(Guard::new("custom", || true)),
        });

        let summary = graph.summary();

        assert_eq!(summary.states.len(), 2);
        assert!(summary.states[1].terminal);
        assert_eq!(summary.transitions[0].trigger, "after 250ms");
        assert_eq!(summary.transitions[1].trigger, "finished");
        assert_eq!(summary.incoming("b").len(), 2);
    }

    #[test]
    fn summary_serializes_to_json() {
        let (graph, _, _) = two_states();

        let json = graph.summary().to_json().unwrap();
        let back: GraphSummary = serde_json::from_str(&json).unwrap();

        assert_eq!(back, graph.summary());
    }
}
