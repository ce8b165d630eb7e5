use super::Requirements;
use crate::builder::{BuildContext, BuildError};
use crate::core::Action;

/// Writes bytes to the configured channel whenever its state is entered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Send {
    data: Vec<u8>,
}

impl Send {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn requirements(&self) -> Requirements {
        Requirements::default()
    }

    pub(crate) fn build(&self, ctx: &mut BuildContext<'_>) -> Result<(), BuildError> {
        let channel = ctx.channel("Send")?;
        ctx.add_entry_action(Action::Write {
            channel,
            data: self.data.clone(),
        });
        Ok(())
    }
}
