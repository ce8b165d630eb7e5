//! Core state graph types.
//!
//! This module contains the data the builder produces and the runtime
//! drives:
//! - State nodes addressed by `StateId`
//! - Transitions with triggers and guard predicates
//! - Timers and entry actions bound to states
//! - Immutable history of fired transitions

mod graph;
mod guard;
mod history;
mod state;
mod transition;

pub use graph::{GraphSummary, StateGraph, StateSummary, TransitionSummary};
pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use state::{StateId, StateKind, StateNode};
pub use transition::{Action, EntryAction, TimerId, TimerSpec, Transition, Trigger};
