//! Safety input reads via the Pi GPIO header.
//!
//! The interlock and override lines are wired to BCM input pins; a high
//! level means interlock closed / override asserted. Pin assignment is
//! board-specific configuration, not core logic.

use crate::hardware::capabilities::SafetyInputs;
use anyhow::{Context, Result};
use rppal::gpio::{Gpio, InputPin};

pub struct GpioSafetyInputs {
    interlock: InputPin,
    override_line: InputPin,
}

impl GpioSafetyInputs {
    /// Claim both input pins.
    pub fn new(interlock_pin: u8, override_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().context("Failed to open GPIO peripheral")?;
        let interlock = gpio
            .get(interlock_pin)
            .with_context(|| format!("Failed to claim interlock pin {interlock_pin}"))?
            .into_input();
        let override_line = gpio
            .get(override_pin)
            .with_context(|| format!("Failed to claim override pin {override_pin}"))?
            .into_input();
        Ok(Self {
            interlock,
            override_line,
        })
    }
}

impl SafetyInputs for GpioSafetyInputs {
    fn interlock_closed(&self) -> bool {
        self.interlock.is_high()
    }

    fn override_asserted(&self) -> bool {
        self.override_line.is_high()
    }
}
