//! Builder turning operation scripts into state machines.

use super::context::{resolve_target, BuildContext, Level};
use super::error::BuildError;
use super::params::{Param, Parameters};
use super::validation;
use crate::core::{GraphSummary, StateGraph, StateKind, Transition, Trigger};
use crate::ops::{OpKind, Operation, Target};
use crate::runtime::{Scheduler, StateMachine};

/// Operations sharing one state. The head is built first and decides the
/// kind of the state; nested groups become its children.
#[derive(Clone, Debug)]
struct Group {
    ops: Vec<Operation>,
    children: Vec<Group>,
}

impl Group {
    fn new(head: Operation) -> Self {
        Self {
            ops: vec![head],
            children: Vec::new(),
        }
    }

    fn head(&self) -> &Operation {
        &self.ops[0]
    }

    fn is_final(&self) -> bool {
        matches!(self.head().state_kind(), StateKind::Final { .. })
    }

    /// First operation that would give a final group's state a way out.
    fn leaves_final(&self) -> Option<&'static str> {
        if !self.is_final() {
            return None;
        }
        self.ops[1..]
            .iter()
            .find(|op| !matches!(op.kind(), OpKind::Send(_)))
            .map(Operation::label)
    }

    /// Last name given by any operation of the group.
    fn name(&self) -> Option<&str> {
        self.ops.iter().rev().find_map(Operation::name)
    }

    fn preflight(&self, params: &Parameters) -> Result<(), BuildError> {
        for op in &self.ops {
            op.preflight(params)?;
        }
        self.children.iter().try_for_each(|g| g.preflight(params))
    }
}

/// Builder for state machines described as an ordered list of operations.
///
/// Operations are collected into groups: [`append_new`](Self::append_new)
/// starts a group, [`append`](Self::append) adds to the open one. Each group
/// becomes one state. [`flush`](Self::flush) materializes the pending groups,
/// wiring every operation's implicit successor to the state of the group
/// that follows it and every implicit timeout to the failure terminal of
/// the same nesting level.
///
/// # Example
///
/// ```rust
/// use scriptstate::builder::{StateGraphBuilder, UseChannel};
/// use scriptstate::channel::ByteChannel;
/// use scriptstate::ops::{self, Named};
/// use scriptstate::runtime::Scheduler;
/// use std::time::Duration;
///
/// let (port, _device) = ByteChannel::pair();
/// let scheduler = Scheduler::new();
///
/// let mut builder = StateGraphBuilder::new();
/// builder.set_parameter(UseChannel::new(&port));
/// builder
///     .append_new(ops::send("ping\n").named("s_ping"))
///     .append(ops::expect("pong").within(Duration::from_millis(100)))
///     .append_new(ops::terminal().named("s_ok"))
///     .append_new(ops::terminal().failure().named("s_failed"));
///
/// let machine = builder.build(&scheduler).unwrap();
/// assert_eq!(machine.graph().len(), 3);
/// ```
pub struct StateGraphBuilder {
    graph: StateGraph,
    params: Parameters,
    root: Level,
    scopes: Vec<Vec<Group>>,
    initial: Option<Target>,
}

impl StateGraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: StateGraph::new(),
            params: Parameters::new(),
            root: Level::default(),
            scopes: vec![Vec::new()],
            initial: None,
        }
    }

    /// Store a parameter for every operation flushed from now on.
    pub fn set_parameter<P: Param>(&mut self, param: P) -> &mut Self {
        self.params.set(param);
        self
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Add `op` to the open group.
    ///
    /// A new group is started when none is open or when the operation
    /// always needs a state of its own.
    pub fn append(&mut self, op: impl Into<Operation>) -> &mut Self {
        let op = op.into();
        let scope = self.scope_mut();
        match scope.last_mut() {
            Some(group) if !op.requirements().must_be_new => group.ops.push(op),
            _ => scope.push(Group::new(op)),
        }
        self
    }

    /// Start a new group, and so a new state, headed by `op`.
    pub fn append_new(&mut self, op: impl Into<Operation>) -> &mut Self {
        let op = op.into();
        self.scope_mut().push(Group::new(op));
        self
    }

    /// Number of operations not yet flushed, at every depth.
    pub fn pending(&self) -> usize {
        fn count(groups: &[Group]) -> usize {
            groups
                .iter()
                .map(|g| g.ops.len() + count(&g.children))
                .sum()
        }
        self.scopes.iter().map(|s| count(s)).sum()
    }

    /// Current nesting depth, zero at the top level.
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Open a nested composition inside the state of the open group.
    ///
    /// Groups appended until the matching [`exit`](Self::exit) become
    /// children of that state and resolve their successor and failure
    /// states among themselves.
    pub fn enter(&mut self) -> Result<&mut Self, BuildError> {
        let parent = self
            .scope()
            .last()
            .ok_or_else(|| BuildError::MalformedNesting("enter() needs an open group".to_string()))?;
        if parent.is_final() {
            return Err(BuildError::MalformedNesting(
                "a final state cannot contain states".to_string(),
            ));
        }
        if !parent.children.is_empty() {
            return Err(BuildError::MalformedNesting(
                "the open group already has nested states".to_string(),
            ));
        }
        self.scopes.push(Vec::new());
        Ok(self)
    }

    /// Close the nested composition opened by [`enter`](Self::enter).
    pub fn exit(&mut self) -> Result<&mut Self, BuildError> {
        if self.scopes.len() < 2 {
            return Err(BuildError::MalformedNesting(
                "exit() without a matching enter()".to_string(),
            ));
        }
        let children = self.scopes.pop().unwrap_or_default();
        if children.is_empty() {
            return Err(BuildError::MalformedNesting(
                "nested composition has no states".to_string(),
            ));
        }
        match self.scope_mut().last_mut() {
            Some(parent) => parent.children = children,
            None => {
                return Err(BuildError::MalformedNesting(
                    "nested composition lost its parent".to_string(),
                ))
            }
        }
        Ok(self)
    }

    /// Use `target` as the initial state instead of the first top-level state.
    pub fn set_initial(&mut self, target: impl Into<Target>) -> &mut Self {
        self.initial = Some(target.into());
        self
    }

    /// Materialize every pending group into states and transitions.
    ///
    /// Does nothing when no operation is pending. On error the graph is left
    /// exactly as it was before the call and the pending operations are
    /// discarded.
    pub fn flush(&mut self) -> Result<(), BuildError> {
        if self.scopes.len() > 1 {
            return Err(BuildError::MalformedNesting(
                "flush() inside an open nested composition".to_string(),
            ));
        }
        let groups = std::mem::take(&mut self.scopes[0]);
        if groups.is_empty() {
            return Ok(());
        }

        let mark = self.graph.mark();
        let mut level = self.root;
        let result = groups
            .iter()
            .try_for_each(|g| g.preflight(&self.params))
            .and_then(|()| self.flush_level(&groups, &mut level));

        match result {
            Ok(()) => {
                self.root = level;
                Ok(())
            }
            Err(err) => {
                self.graph.truncate(mark);
                tracing::warn!(error = %err, "flush failed, pending operations discarded");
                Err(err)
            }
        }
    }

    fn flush_level(&mut self, groups: &[Group], level: &mut Level) -> Result<(), BuildError> {
        // one state per group, so every destination exists before wiring
        let mut states = Vec::with_capacity(groups.len());
        let mut failure = None;
        for group in groups {
            let kind = group.head().state_kind();
            let id = self.graph.add_state(String::new(), kind, level.parent);
            let name = group
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("state{}", id.index()));
            if self.graph.find(&name).is_some() {
                return Err(BuildError::DuplicateState { name });
            }
            if let Some(op) = group.leaves_final() {
                return Err(BuildError::TransitionFromFinal { op, state: name });
            }
            self.graph.rename_state(id, name);
            if kind == (StateKind::Final { failure: true }) && failure.is_none() {
                failure = Some(id);
            }
            states.push(id);
        }
        if failure.is_some() {
            level.failure = failure;
        }

        for (i, group) in groups.iter().enumerate() {
            let state = states[i];
            let next = states.get(i + 1).copied().or(level.next);

            let mut ctx =
                BuildContext::new(&mut self.graph, &self.params, state, next, level.failure);
            for op in &group.ops {
                op.build(&mut ctx)?;
            }

            tracing::debug!(
                state = self.graph.state(state).name(),
                ops = group.ops.len(),
                successor = next.map(|n| self.graph.state(n).name()),
                "flushed group"
            );

            if !group.children.is_empty() {
                let mut nested = Level::nested(state);
                self.flush_level(&group.children, &mut nested)?;
                if group.children.iter().any(Group::is_final) {
                    let target = next.ok_or_else(|| BuildError::UnresolvedSuccessor {
                        op: "nested composition",
                        state: self.graph.state(state).name().to_string(),
                    })?;
                    self.graph.add_transition(Transition {
                        source: state,
                        target,
                        trigger: Trigger::Finished,
                        guard: None,
                    });
                }
            }
        }

        level.next = states.first().copied();
        Ok(())
    }

    /// Graph materialized so far.
    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn summary(&self) -> GraphSummary {
        self.graph.summary()
    }

    /// Flush, validate the graph and turn it into a machine driven by
    /// `scheduler`.
    pub fn build(mut self, scheduler: &Scheduler) -> Result<StateMachine, BuildError> {
        self.flush()?;
        if self.graph.is_empty() {
            return Err(BuildError::EmptyGraph);
        }

        let initial = match &self.initial {
            Some(target) => resolve_target(&self.graph, target)?,
            None => self.graph.roots().next().ok_or(BuildError::EmptyGraph)?,
        };
        if self.graph.state(initial).parent().is_some() {
            return Err(BuildError::MalformedNesting(format!(
                "initial state '{}' must be top-level",
                self.graph.state(initial).name()
            )));
        }

        let violations = validation::violations(&self.graph, initial);
        if !violations.is_empty() {
            return Err(BuildError::InvalidGraph(violations));
        }

        tracing::debug!(
            states = self.graph.len(),
            transitions = self.graph.transitions().len(),
            initial = self.graph.state(initial).name(),
            "built state machine"
        );
        Ok(StateMachine::new(self.graph, initial, scheduler))
    }

    fn scope(&self) -> &Vec<Group> {
        &self.scopes[self.scopes.len() - 1]
    }

    fn scope_mut(&mut self) -> &mut Vec<Group> {
        let top = self.scopes.len() - 1;
        &mut self.scopes[top]
    }
}

impl Default for StateGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
