//! Virtual clock driving every timer of a simulation.
//!
//! Nothing happens on its own: time only moves when [`Scheduler::advance`]
//! is called, which makes machine runs fully deterministic.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

type Callback = Box<dyn FnOnce()>;

/// Handle to a scheduled callback, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle {
    deadline: Duration,
    seq: u64,
}

impl TimerHandle {
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

#[derive(Default)]
struct SchedulerInner {
    now: Cell<Duration>,
    next_seq: Cell<u64>,
    timers: RefCell<BTreeMap<TimerHandle, Callback>>,
}

/// Shared handle to a virtual clock and its pending callbacks.
///
/// Callbacks due at the same instant run in the order they were scheduled.
///
/// # Example
///
/// ```rust
/// use scriptstate::runtime::Scheduler;
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use std::time::Duration;
///
/// let scheduler = Scheduler::new();
/// let fired = Rc::new(Cell::new(false));
/// let flag = Rc::clone(&fired);
/// scheduler.schedule(Duration::from_millis(500), move || flag.set(true));
///
/// scheduler.advance(Duration::from_millis(499));
/// assert!(!fired.get());
/// scheduler.advance(Duration::from_millis(1));
/// assert!(fired.get());
/// ```
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.inner.now.get()
    }

    /// Run `callback` once `after` has elapsed.
    pub fn schedule<F>(&self, after: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        let handle = TimerHandle {
            deadline: self.now().saturating_add(after),
            seq,
        };
        self.inner
            .timers
            .borrow_mut()
            .insert(handle, Box::new(callback));
        handle
    }

    /// Drop a pending callback. Returns false if it already ran or was
    /// cancelled.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        self.inner.timers.borrow_mut().remove(&handle).is_some()
    }

    pub fn pending(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner
            .timers
            .borrow()
            .keys()
            .next()
            .map(TimerHandle::deadline)
    }

    /// Move the clock forward by `by`, running every callback that falls due
    /// on the way at its own deadline.
    ///
    /// Callbacks scheduled by other callbacks run too if they fall due
    /// before the end of the step.
    pub fn advance(&self, by: Duration) {
        let target = self.now().saturating_add(by);
        while let Some((handle, callback)) = self.pop_due(target) {
            self.inner.now.set(handle.deadline);
            callback();
        }
        self.inner.now.set(target);
    }

    /// Run callbacks already due without moving the clock.
    pub fn run_pending(&self) {
        self.advance(Duration::ZERO);
    }

    fn pop_due(&self, target: Duration) -> Option<(TimerHandle, Callback)> {
        let mut timers = self.inner.timers.borrow_mut();
        let handle = *timers.keys().next()?;
        if handle.deadline > target {
            return None;
        }
        timers.remove(&handle).map(|callback| (handle, callback))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}
