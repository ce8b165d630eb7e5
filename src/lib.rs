//! Scriptstate: declarative protocol scripts compiled into state machines
//!
//! A protocol participant is described as an ordered list of operations:
//! send some bytes, expect a line containing a pattern, wait a while, stop.
//! The builder groups those operations into states, works out where each
//! one leads and which state a timeout falls back to, checks the result for
//! unreachable states and dead ends, and hands back a machine that runs
//! against in-memory byte channels on a virtual clock.
//!
//! # Core Concepts
//!
//! - **Channel**: in-memory duplex byte pipe with line-oriented reads
//! - **Operation**: one step of a script (`send`, `expect`, `delay`, `terminal`)
//! - **Builder**: turns scripts into validated state graphs
//! - **Runtime**: event-driven machines and the scheduler driving their timers
//!
//! # Example
//!
//! ```rust
//! use scriptstate::builder::{StateGraphBuilder, UseChannel};
//! use scriptstate::channel::ByteChannel;
//! use scriptstate::ops::{self, Named};
//! use scriptstate::runtime::Scheduler;
//! use std::time::Duration;
//!
//! let (port, device) = ByteChannel::pair();
//! let scheduler = Scheduler::new();
//!
//! let mut builder = StateGraphBuilder::new();
//! builder.set_parameter(UseChannel::new(&port));
//! builder
//!     .append_new(ops::send("boot\n").named("s_boot"))
//!     .append(ops::expect("boot successful").within(Duration::from_millis(1000)))
//!     .append_new(ops::terminal().named("s_ok"))
//!     .append_new(ops::terminal().failure().named("s_failed"));
//! let machine = builder.build(&scheduler).unwrap();
//!
//! machine.start();
//! assert_eq!(device.read_line(), Some(b"boot\n".to_vec()));
//!
//! device.write(b"boot successful\n").unwrap();
//! assert_eq!(machine.current_state().as_deref(), Some("s_ok"));
//! assert!(!machine.is_running());
//! ```

pub mod builder;
pub mod channel;
pub mod core;
pub mod handshake;
pub mod observer;
pub mod ops;
pub mod runtime;

// Re-export commonly used types
pub use builder::{BuildError, StateGraphBuilder, UseChannel};
pub use channel::{ByteChannel, OpenMode};
pub use core::{StateGraph, StateHistory, StateTransition};
pub use observer::{EventLog, Observer};
pub use ops::{Named, Operation};
pub use runtime::{Scheduler, StateMachine};
