use super::Requirements;

/// Final state ending the script, on success or failure.
///
/// A failure terminal becomes the target of every implicit timeout at its
/// level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Terminal {
    failure: bool,
}

impl Terminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark this terminal as the failure state.
    pub fn failure(mut self) -> Self {
        self.failure = true;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.failure
    }

    pub fn requirements(&self) -> Requirements {
        Requirements {
            must_be_new: true,
            ..Requirements::default()
        }
    }
}
