//! Event-driven execution of a built state graph.

use super::scheduler::{Scheduler, TimerHandle};
use crate::channel::{ByteChannel, ChannelEvent, ChannelId, ListenerId};
use crate::core::{StateGraph, StateHistory, StateId, StateTransition, TimerId, Transition, Trigger};
use crate::observer::Observer;
use chrono::Utc;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/// Something the machine reacts to, queued until the current step is done.
#[derive(Clone, Copy, Debug)]
enum Event {
    Start,
    Stop,
    DataArrived(ChannelId),
    Timer { timer: TimerId, epoch: u64 },
    Finished(StateId),
}

#[derive(Default)]
struct RunState {
    running: bool,
    /// Active configuration, outermost state first.
    active: Vec<StateId>,
    /// Entry count per state. Timer events from an earlier entry are stale.
    epochs: Vec<u64>,
    timers: Vec<(StateId, TimerHandle)>,
    history: StateHistory,
}

struct MachineCore {
    id: Uuid,
    graph: StateGraph,
    initial: StateId,
    scheduler: Scheduler,
    run: RefCell<RunState>,
    queue: RefCell<VecDeque<Event>>,
    dispatching: Cell<bool>,
    observers: RefCell<Vec<Rc<dyn Observer>>>,
    subscriptions: RefCell<Vec<(ByteChannel, ListenerId)>>,
}

impl Drop for MachineCore {
    fn drop(&mut self) {
        for (channel, listener) in self.subscriptions.get_mut().drain(..) {
            channel.unsubscribe(listener);
        }
        for (_, handle) in self.run.get_mut().timers.drain(..) {
            self.scheduler.cancel(handle);
        }
    }
}

/// A running instance of a state graph.
///
/// The machine reacts to data arriving on the channels its graph watches
/// and to timers fired by its [`Scheduler`]. Every event is processed to
/// completion before the next one is looked at; events raised while a step
/// is in progress, including by the machine's own writes, are queued.
///
/// Reaching a top-level final state stops the machine.
pub struct StateMachine {
    core: Rc<MachineCore>,
}

impl StateMachine {
    pub(crate) fn new(graph: StateGraph, initial: StateId, scheduler: &Scheduler) -> Self {
        let run = RunState {
            epochs: vec![0; graph.len()],
            ..RunState::default()
        };
        let core = Rc::new(MachineCore {
            id: Uuid::new_v4(),
            graph,
            initial,
            scheduler: scheduler.clone(),
            run: RefCell::new(run),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            observers: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(Vec::new()),
        });

        let mut subscriptions = Vec::new();
        for channel in core.graph.channels() {
            let weak = Rc::downgrade(&core);
            let listener = channel.subscribe(move |source, event| {
                if let ChannelEvent::DataArrived = event {
                    Self::post_weak(&weak, Event::DataArrived(source.id()));
                }
            });
            subscriptions.push((channel.clone(), listener));
        }
        *core.subscriptions.borrow_mut() = subscriptions;

        Self { core }
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    pub fn graph(&self) -> &StateGraph {
        &self.core.graph
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.core.scheduler
    }

    pub fn initial_state(&self) -> &str {
        self.core.graph.state(self.core.initial).name()
    }

    pub fn is_running(&self) -> bool {
        self.core.run.borrow().running
    }

    /// Innermost active state.
    ///
    /// After the machine finished this is the final state it stopped in.
    pub fn current_state(&self) -> Option<String> {
        let run = self.core.run.borrow();
        run.active
            .last()
            .map(|id| self.core.graph.state(*id).name().to_string())
    }

    /// Active configuration, outermost first.
    pub fn active_states(&self) -> Vec<String> {
        let run = self.core.run.borrow();
        run.active
            .iter()
            .map(|id| self.core.graph.state(*id).name().to_string())
            .collect()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.core
            .graph
            .find(name)
            .is_some_and(|id| self.core.run.borrow().active.contains(&id))
    }

    /// Transitions fired since the last start.
    pub fn history(&self) -> StateHistory {
        self.core.run.borrow().history.clone()
    }

    pub fn add_observer(&self, observer: Rc<dyn Observer>) {
        self.core.observers.borrow_mut().push(observer);
    }

    /// Enter the initial state. Does nothing if already running.
    pub fn start(&self) {
        self.post(Event::Start);
    }

    /// Leave every active state without running further actions.
    pub fn stop(&self) {
        self.post(Event::Stop);
    }

    fn post_weak(core: &Weak<MachineCore>, event: Event) {
        if let Some(core) = core.upgrade() {
            StateMachine { core }.post(event);
        }
    }

    fn post(&self, event: Event) {
        self.core.queue.borrow_mut().push_back(event);
        if self.core.dispatching.replace(true) {
            return;
        }
        loop {
            let next = self.core.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };
            self.process(event);
        }
        self.core.dispatching.set(false);
    }

    fn process(&self, event: Event) {
        match event {
            Event::Start => self.handle_start(),
            Event::Stop => self.handle_stop(),
            Event::DataArrived(channel) => self.handle_data(channel),
            Event::Timer { timer, epoch } => self.handle_timer(timer, epoch),
            Event::Finished(parent) => self.handle_finished(parent),
        }
    }

    fn handle_start(&self) {
        {
            let mut run = self.core.run.borrow_mut();
            if run.running {
                return;
            }
            run.running = true;
            run.active.clear();
            run.history = StateHistory::new();
        }
        tracing::info!(
            machine = %self.core.id,
            initial = self.initial_state(),
            "state machine started"
        );
        self.notify(|o| o.on_running_changed(true));
        self.enter_target(self.core.initial, 0);
    }

    fn handle_stop(&self) {
        {
            let mut run = self.core.run.borrow_mut();
            if !run.running {
                return;
            }
            run.running = false;
            run.active.clear();
        }
        self.cancel_timers(|_| true);
        tracing::info!(machine = %self.core.id, "state machine stopped");
        self.notify(|o| o.on_running_changed(false));
    }

    fn handle_data(&self, channel: ChannelId) {
        let active = {
            let run = self.core.run.borrow();
            if !run.running {
                return;
            }
            run.active.clone()
        };
        let trigger = Trigger::DataArrived(channel);
        for state in active.iter().rev() {
            let fired = self
                .core
                .graph
                .transitions_from(*state)
                .find(|t| t.trigger == trigger && t.can_fire());
            if let Some(transition) = fired {
                self.fire(transition);
                return;
            }
        }
    }

    fn handle_timer(&self, timer: TimerId, epoch: u64) {
        let spec = self.core.graph.timer(timer);
        {
            let run = self.core.run.borrow();
            let current = run.epochs[spec.state.index()] == epoch;
            if !run.running || !current || !run.active.contains(&spec.state) {
                return;
            }
        }
        let fired = self
            .core
            .graph
            .transitions_from(spec.state)
            .find(|t| t.trigger == Trigger::Timer(timer) && t.can_fire());
        if let Some(transition) = fired {
            self.fire(transition);
        }
    }

    fn handle_finished(&self, parent: StateId) {
        {
            let run = self.core.run.borrow();
            if !run.running || !run.active.contains(&parent) {
                return;
            }
        }
        let fired = self
            .core
            .graph
            .transitions_from(parent)
            .find(|t| t.trigger == Trigger::Finished && t.can_fire());
        if let Some(transition) = fired {
            self.fire(transition);
        }
    }

    fn fire(&self, transition: &Transition) {
        let graph = &self.core.graph;
        let source = graph.path_to(transition.source);
        let target = graph.path_to(transition.target);

        // deepest common proper ancestor of source and target
        let mut depth = 0;
        while depth + 1 < source.len() && depth + 1 < target.len() && source[depth] == target[depth]
        {
            depth += 1;
        }

        let from = self.current_state().unwrap_or_default();
        let to = graph.state(transition.target).name().to_string();
        let trigger = graph.describe_trigger(transition);
        tracing::debug!(
            machine = %self.core.id,
            from = %from,
            to = %to,
            trigger = %trigger,
            "transition"
        );

        self.exit_to_depth(depth);
        {
            let mut run = self.core.run.borrow_mut();
            let record = StateTransition {
                from,
                to,
                trigger,
                timestamp: Utc::now(),
                at: self.core.scheduler.now(),
            };
            run.history = run.history.record(record);
        }
        self.enter_target(transition.target, depth);
    }

    fn exit_to_depth(&self, depth: usize) {
        loop {
            let left = {
                let mut run = self.core.run.borrow_mut();
                if run.active.len() <= depth {
                    break;
                }
                run.active.pop()
            };
            if let Some(state) = left {
                self.cancel_timers(|s| s == state);
                tracing::trace!(state = self.core.graph.state(state).name(), "exit");
            }
        }
    }

    /// Enter `target` and its ancestors below `depth`, then descend through
    /// first children.
    fn enter_target(&self, target: StateId, depth: usize) {
        let graph = &self.core.graph;
        let path = graph.path_to(target);
        let first_children = std::iter::successors(graph.state(target).children().first().copied(), |c| {
            graph.state(*c).children().first().copied()
        });
        for state in path.into_iter().skip(depth).chain(first_children) {
            if !self.enter_state(state) {
                return;
            }
        }
    }

    /// Returns false once the machine is no longer running.
    fn enter_state(&self, state: StateId) -> bool {
        let node = self.core.graph.state(state);
        let epoch = {
            let mut run = self.core.run.borrow_mut();
            if !run.running {
                return false;
            }
            run.active.push(state);
            run.epochs[state.index()] += 1;
            run.epochs[state.index()]
        };
        tracing::info!(machine = %self.core.id, state = node.name(), "entered state");
        self.notify(|o| o.on_state_changed(node.name()));

        for (timer, spec) in self.core.graph.timers_of(state) {
            let weak = Rc::downgrade(&self.core);
            let handle = self.core.scheduler.schedule(spec.after, move || {
                Self::post_weak(&weak, Event::Timer { timer, epoch });
            });
            self.core.run.borrow_mut().timers.push((state, handle));
        }

        for action in self.core.graph.entry_actions_of(state) {
            if let Err(err) = action.run() {
                tracing::warn!(state = node.name(), error = %err, "entry action failed");
            }
        }

        if !node.is_final() {
            return true;
        }
        match node.parent() {
            Some(parent) => {
                self.core.queue.borrow_mut().push_back(Event::Finished(parent));
                true
            }
            None => {
                self.finish(state);
                false
            }
        }
    }

    fn finish(&self, state: StateId) {
        self.core.run.borrow_mut().running = false;
        self.cancel_timers(|_| true);
        let node = self.core.graph.state(state);
        tracing::info!(
            machine = %self.core.id,
            state = node.name(),
            failure = node.is_failure(),
            "state machine finished"
        );
        self.notify(|o| o.on_running_changed(false));
    }

    fn cancel_timers(&self, mut matches: impl FnMut(StateId) -> bool) {
        let cancelled: Vec<TimerHandle> = {
            let mut run = self.core.run.borrow_mut();
            let (gone, kept): (Vec<_>, Vec<_>) =
                run.timers.drain(..).partition(|(s, _)| matches(*s));
            run.timers = kept;
            gone.into_iter().map(|(_, handle)| handle).collect()
        };
        for handle in cancelled {
            self.core.scheduler.cancel(handle);
        }
    }

    fn notify(&self, f: impl Fn(&dyn Observer)) {
        let observers: Vec<Rc<dyn Observer>> = self.core.observers.borrow().clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("id", &self.core.id)
            .field("running", &self.is_running())
            .field("active", &self.active_states())
            .finish()
    }
}
