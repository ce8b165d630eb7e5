//! Builder turning operation scripts into state machines.
//!
//! A script is an ordered list of [operations](crate::ops) appended to a
//! [`StateGraphBuilder`]. Operations never name the states they lead to
//! unless asked to: the builder resolves each implicit successor to the
//! state built after it, and each implicit timeout to the failure
//! terminal of the same nesting level.
//!
//! # Example
//!
//! ```rust
//! use scriptstate::builder::{BuildError, StateGraphBuilder};
//! use scriptstate::ops;
//!
//! let mut builder = StateGraphBuilder::new();
//! builder.append_new(ops::send("boot\n"));
//!
//! // Send needs a channel to write to
//! let err = builder.flush().unwrap_err();
//! assert!(matches!(err, BuildError::MissingParameter { op: "Send", .. }));
//! assert!(builder.graph().is_empty());
//! ```

mod context;
pub mod error;
mod machine;
mod params;
pub mod validation;

pub(crate) use context::BuildContext;
pub use error::BuildError;
pub use machine::StateGraphBuilder;
pub use params::{Param, Parameters, UseChannel};
pub use validation::GraphViolation;
