use super::{Requirements, Target};
use crate::builder::{BuildContext, BuildError};
use crate::core::Trigger;
use std::time::Duration;

/// Single-shot timer started on entry, moving on when it expires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delay {
    after: Duration,
    dst: Option<Target>,
}

impl Delay {
    pub fn new(after: Duration) -> Self {
        Self { after, dst: None }
    }

    /// Go to `target` instead of the successor.
    pub fn to(mut self, target: impl Into<Target>) -> Self {
        self.dst = Some(target.into());
        self
    }

    pub fn after(&self) -> Duration {
        self.after
    }

    pub fn requirements(&self) -> Requirements {
        Requirements {
            needs_next: self.dst.is_none(),
            ..Requirements::default()
        }
    }

    pub(crate) fn build(&self, ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
        let target = ctx.resolve_next(self.dst.as_ref(), "Delay")?;
        let timer = ctx.add_timer(self.after);
        ctx.add_transition(target, Trigger::Timer(timer), None);
        Ok(())
    }
}
