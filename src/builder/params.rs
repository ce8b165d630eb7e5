//! Typed parameters shared by every operation of a builder.
//!
//! Each parameter kind is its own Rust type and doubles as its key, so a
//! lookup either yields a value of exactly that type or nothing.

use super::BuildError;
use crate::channel::ByteChannel;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// A value that configures how operations are built.
pub trait Param: Any + Clone {
    /// Name used in error messages.
    const NAME: &'static str;
}

/// The channel `Send` and `Expect` operations talk through.
#[derive(Clone, Debug)]
pub struct UseChannel(pub ByteChannel);

impl UseChannel {
    pub fn new(channel: &ByteChannel) -> Self {
        Self(channel.clone())
    }
}

impl Param for UseChannel {
    const NAME: &'static str = "channel";
}

/// Registry of parameters, at most one per parameter type.
#[derive(Default)]
pub struct Parameters {
    values: HashMap<TypeId, Box<dyn Any>>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `param`, replacing any previous value of the same type.
    pub fn set<P: Param>(&mut self, param: P) {
        self.values.insert(TypeId::of::<P>(), Box::new(param));
    }

    pub fn get<P: Param>(&self) -> Option<&P> {
        self.values
            .get(&TypeId::of::<P>())
            .and_then(|value| value.downcast_ref::<P>())
    }

    pub fn contains<P: Param>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<P>())
    }

    pub(crate) fn require<P: Param>(&self, op: &'static str) -> Result<&P, BuildError> {
        self.get::<P>().ok_or(BuildError::MissingParameter {
            op,
            param: P::NAME,
        })
    }

    pub(crate) fn require_channel(&self, op: &'static str) -> Result<ByteChannel, BuildError> {
        self.require::<UseChannel>(op).map(|p| p.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Retries(u32);

    impl Param for Retries {
        const NAME: &'static str = "retries";
    }

    #[test]
    fn values_are_keyed_by_type() {
        let mut params = Parameters::new();
        params.set(Retries(3));

        assert_eq!(params.get::<Retries>(), Some(&Retries(3)));
        assert!(!params.contains::<UseChannel>());
    }

    #[test]
    fn set_replaces_previous_value() {
        let mut params = Parameters::new();
        let (a, b) = ByteChannel::pair();
        params.set(UseChannel::new(&a));
        params.set(UseChannel::new(&b));

        let channel = params.require_channel("Send").unwrap();
        assert!(channel.same_endpoint(&b));
    }

    #[test]
    fn missing_parameter_names_op_and_param() {
        let params = Parameters::new();

        let err = params.require_channel("Expect").unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingParameter {
                op: "Expect",
                param: "channel",
            }
        );
    }
}
