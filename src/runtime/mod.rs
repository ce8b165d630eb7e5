//! Runtime for built state graphs.
//!
//! A [`StateMachine`] executes one graph against the channels it watches.
//! All machines of a simulation share one [`Scheduler`], whose virtual
//! clock decides when their timers fire.

mod machine;
mod scheduler;

pub use machine::StateMachine;
pub use scheduler::{Scheduler, TimerHandle};
