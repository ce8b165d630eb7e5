use super::{Requirements, Target};
use crate::builder::{BuildContext, BuildError};
use crate::core::{Guard, Trigger};
use std::time::Duration;

/// Waits for a line containing a pattern, optionally with a timeout.
///
/// Without an explicit destination the transition goes to the successor
/// state. A non-zero timeout without an explicit timeout destination goes
/// to the failure state of the enclosing level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expect {
    pattern: Vec<u8>,
    dst: Option<Target>,
    timeout: Duration,
    timeout_dst: Option<Target>,
}

impl Expect {
    pub fn new(pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            pattern: pattern.into(),
            dst: None,
            timeout: Duration::ZERO,
            timeout_dst: None,
        }
    }

    /// Go to `target` on a match instead of the successor.
    pub fn to(mut self, target: impl Into<Target>) -> Self {
        self.dst = Some(target.into());
        self
    }

    /// Give up after `timeout` without a match. Zero disables the timeout.
    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Go to `target` on timeout instead of the failure state.
    pub fn on_timeout(mut self, target: impl Into<Target>) -> Self {
        self.timeout_dst = Some(target.into());
        self
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn requirements(&self) -> Requirements {
        Requirements {
            must_be_new: false,
            needs_next: self.dst.is_none(),
            needs_failure: !self.timeout.is_zero() && self.timeout_dst.is_none(),
        }
    }

    pub(crate) fn build(&self, ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
        let channel = ctx.channel("Expect")?;
        let target = ctx.resolve_next(self.dst.as_ref(), "Expect")?;
        ctx.watch_channel(&channel);
        ctx.add_transition(
            target,
            Trigger::DataArrived(channel.id()),
            Some(Guard::line_contains(channel, self.pattern.clone())),
        );

        if self.timeout.is_zero() {
            return Ok(());
        }
        let timeout_target = ctx.resolve_failure(self.timeout_dst.as_ref(), "Expect")?;
        let timer = ctx.add_timer(self.timeout);
        ctx.add_transition(timeout_target, Trigger::Timer(timer), None);
        Ok(())
    }
}
