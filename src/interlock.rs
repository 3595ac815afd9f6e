//! Safety interlock state machine.
//!
//! The interlock status is derived, never stored: both digital inputs are
//! read live on every check, so a door opened between two commands is seen
//! immediately. Every mutating command must pass through [`InterlockStatus::gate`]
//! before touching hardware.

use crate::hardware::capabilities::SafetyInputs;
use crate::protocol::codes::Code;

/// Reduction of the two safety inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockStatus {
    /// Interlock closed: operate normally.
    Closed,
    /// Interlock open but the operator override is asserted: operate, but
    /// every response carries the override warning.
    OpenOverridden,
    /// Interlock open, no override: refuse all mutating commands.
    Open,
}

impl InterlockStatus {
    /// Read both inputs and reduce them to a status.
    pub fn read(inputs: &dyn SafetyInputs) -> Self {
        if inputs.interlock_closed() {
            InterlockStatus::Closed
        } else if inputs.override_asserted() {
            InterlockStatus::OpenOverridden
        } else {
            InterlockStatus::Open
        }
    }

    /// Gate a mutating command: `Ok(None)` to proceed, `Ok(Some(code))` to
    /// proceed while attaching the override warning, `Err(code)` to refuse.
    pub fn gate(self) -> Result<Option<Code>, Code> {
        match self {
            InterlockStatus::Closed => Ok(None),
            InterlockStatus::OpenOverridden => Ok(Some(Code::OverrideActive)),
            InterlockStatus::Open => Err(Code::InterlockOpen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockSafetyInputs;

    #[test]
    fn both_inputs_reduce_to_three_statuses() {
        let inputs = MockSafetyInputs::new(true, false);
        assert_eq!(InterlockStatus::read(&inputs), InterlockStatus::Closed);

        inputs.set_interlock(false);
        assert_eq!(InterlockStatus::read(&inputs), InterlockStatus::Open);

        inputs.set_override(true);
        assert_eq!(InterlockStatus::read(&inputs), InterlockStatus::OpenOverridden);

        // Override has no effect while the interlock is closed.
        inputs.set_interlock(true);
        assert_eq!(InterlockStatus::read(&inputs), InterlockStatus::Closed);
    }

    #[test]
    fn gate_maps_statuses_to_codes() {
        assert_eq!(InterlockStatus::Closed.gate(), Ok(None));
        assert_eq!(
            InterlockStatus::OpenOverridden.gate(),
            Ok(Some(Code::OverrideActive))
        );
        assert_eq!(InterlockStatus::Open.gate(), Err(Code::InterlockOpen));
    }
}
