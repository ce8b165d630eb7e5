//! Build errors for machine scripts.

use super::validation::GraphViolation;
use thiserror::Error;

/// Configuration mistakes in a machine script.
///
/// All of these are fatal: the flush or build that reports one leaves no
/// usable partial machine behind.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("{op} needs the '{param}' parameter. Call .set_parameter() before flushing")]
    MissingParameter { op: &'static str, param: &'static str },

    #[error("{op} in state '{state}' has no successor state to go to")]
    UnresolvedSuccessor { op: &'static str, state: String },

    #[error("{op} in state '{state}' has no failure state. Append a Terminal::new().failure()")]
    UnresolvedFailure { op: &'static str, state: String },

    #[error("No state named '{name}'")]
    UnknownState { name: String },

    #[error("{op} cannot join final state '{state}'. Only Send may follow a Terminal in its group")]
    TransitionFromFinal { op: &'static str, state: String },

    #[error("State name '{name}' is already taken")]
    DuplicateState { name: String },

    #[error("Malformed nesting: {0}")]
    MalformedNesting(String),

    #[error("No states defined. Append at least one operation")]
    EmptyGraph,

    #[error("Invalid state graph: {}", format_violations(.0))]
    InvalidGraph(Vec<GraphViolation>),
}

fn format_violations(violations: &[GraphViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
