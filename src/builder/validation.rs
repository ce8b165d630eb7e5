//! Structural validation of a built state graph.
//!
//! Checks are accumulated with Stillwater's `Validation` so a script with
//! several wiring mistakes reports all of them at once.

use crate::core::{StateGraph, StateId};
use std::collections::VecDeque;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A structural defect of a state graph.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphViolation {
    #[error("State '{state}' is reachable but has no way out and is not final")]
    DeadEnd { state: String },

    #[error("State '{state}' cannot be reached from the initial state")]
    Unreachable { state: String },
}

/// States reachable from `initial`, entering composites through their
/// first child and leaving any state through its own or its ancestors'
/// transitions.
pub fn reachable(graph: &StateGraph, initial: StateId) -> Vec<bool> {
    let mut seen = vec![false; graph.len()];
    let mut queue = VecDeque::new();

    enter(graph, initial, &mut seen, &mut queue);
    while let Some(state) = queue.pop_front() {
        for transition in graph.transitions_from(state) {
            enter(graph, transition.target, &mut seen, &mut queue);
        }
    }
    seen
}

// entering a state also enters its ancestors and its chain of first children
fn enter(graph: &StateGraph, id: StateId, seen: &mut [bool], queue: &mut VecDeque<StateId>) {
    let first_children = std::iter::successors(graph.state(id).children().first().copied(), |c| {
        graph.state(*c).children().first().copied()
    });
    for state in graph.path_to(id).into_iter().chain(first_children) {
        if !seen[state.index()] {
            seen[state.index()] = true;
            queue.push_back(state);
        }
    }
}

fn has_way_out(graph: &StateGraph, state: StateId) -> bool {
    let node = graph.state(state);
    node.is_final()
        || node.is_composite()
        || graph
            .path_to(state)
            .into_iter()
            .any(|s| graph.transitions_from(s).next().is_some())
}

/// Check that every state is reachable and no reachable state is a dead end.
pub fn validate(graph: &StateGraph, initial: StateId) -> Validation<(), NonEmptyVec<GraphViolation>> {
    let seen = reachable(graph, initial);
    let mut checks: Vec<Validation<(), NonEmptyVec<GraphViolation>>> = Vec::new();

    for state in graph.states() {
        let name = state.name().to_string();
        let check = if !seen[state.id().index()] {
            Validation::fail(GraphViolation::Unreachable { state: name })
        } else if !has_way_out(graph, state.id()) {
            Validation::fail(GraphViolation::DeadEnd { state: name })
        } else {
            Validation::success(())
        };
        checks.push(check);
    }

    Validation::all_vec(checks).map(|_| ())
}

/// Run [`validate`] and turn failures into a plain list.
pub fn violations(graph: &StateGraph, initial: StateId) -> Vec<GraphViolation> {
    match validate(graph, initial) {
        Validation::Success(_) => Vec::new(),
        Validation::Failure(errors) => errors.iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{StateKind, TimerId, Transition, Trigger};
    use std::time::Duration;

    fn edge(graph: &mut StateGraph, from: StateId, to: StateId) {
        let timer: TimerId = graph.add_timer(from, Duration::from_millis(1));
        graph.add_transition(Transition {
            source: from,
            target: to,
            trigger: Trigger::Timer(timer),
            guard: None,
        });
    }

    #[test]
    fn well_formed_graph_passes() {
        let mut graph = StateGraph::new();
        let a = graph.add_state("a", StateKind::Normal, None);
        let b = graph.add_state("b", StateKind::Final { failure: false }, None);
        edge(&mut graph, a, b);

        assert!(validate(&graph, a).is_success());
    }

    #[test]
    fn accumulates_all_violations() {
        let mut graph = StateGraph::new();
        let a = graph.add_state("a", StateKind::Normal, None);
        let stuck = graph.add_state("stuck", StateKind::Normal, None);
        graph.add_state("orphan", StateKind::Final { failure: true }, None);
        edge(&mut graph, a, stuck);

        let result = validate(&graph, a);

        match result {
            Validation::Failure(errors) => {
                assert_eq!(errors.len(), 2);
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, GraphViolation::DeadEnd { state } if state == "stuck")));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, GraphViolation::Unreachable { state } if state == "orphan")));
            }
            Validation::Success(_) => panic!("Expected violations, got success"),
        }
    }

    #[test]
    fn children_are_reached_through_their_parent() {
        let mut graph = StateGraph::new();
        let parent = graph.add_state("parent", StateKind::Normal, None);
        let first = graph.add_state("first", StateKind::Normal, Some(parent));
        let last = graph.add_state("last", StateKind::Final { failure: false }, Some(parent));
        let after = graph.add_state("after", StateKind::Final { failure: false }, None);
        edge(&mut graph, first, last);
        graph.add_transition(Transition {
            source: parent,
            target: after,
            trigger: Trigger::Finished,
            guard: None,
        });

        assert!(violations(&graph, parent).is_empty());
    }

    #[test]
    fn ancestor_transition_is_a_way_out() {
        let mut graph = StateGraph::new();
        let parent = graph.add_state("parent", StateKind::Normal, None);
        graph.add_state("idle", StateKind::Normal, Some(parent));
        let done = graph.add_state("done", StateKind::Final { failure: false }, None);
        edge(&mut graph, parent, done);

        assert!(violations(&graph, parent).is_empty());
    }
}
