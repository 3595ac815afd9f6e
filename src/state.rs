//! Shared device state.
//!
//! One `DeviceState` instance exists for the lifetime of the server. It is
//! owned by the command engine behind a lock and mutated only by
//! successfully-validated, interlock-permitting commands. Defaults are
//! hardware-safe: zero power, independent operation, no modulation.

use std::fmt;
use std::str::FromStr;

/// Laser/camera triggering relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    /// Laser is triggered by the camera.
    Gated,
    /// Camera is triggered by the laser.
    Master,
    /// Laser and camera run independently.
    Indep,
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationMode::Gated => "gated",
            OperationMode::Master => "master",
            OperationMode::Indep => "indep",
        };
        f.write_str(name)
    }
}

impl FromStr for OperationMode {
    type Err = ();

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "gated" => Ok(OperationMode::Gated),
            "master" => Ok(OperationMode::Master),
            "indep" => Ok(OperationMode::Indep),
            _ => Err(()),
        }
    }
}

/// Waveform applied to the laser output power over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    /// No output.
    None,
    Sine,
    Square,
    Triangle,
    Sawtooth,
    /// Constant output at the set power.
    Full,
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::None => "none",
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Full => "full",
        };
        f.write_str(name)
    }
}

impl FromStr for Waveform {
    type Err = ();

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "none" => Ok(Waveform::None),
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "triangle" => Ok(Waveform::Triangle),
            "sawtooth" => Ok(Waveform::Sawtooth),
            "full" => Ok(Waveform::Full),
            _ => Err(()),
        }
    }
}

/// Modulation polarity applied between the waveform generator and the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Pass,
    Invert,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Polarity::Pass => "pass",
            Polarity::Invert => "invert",
        };
        f.write_str(name)
    }
}

impl FromStr for Polarity {
    type Err = ();

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "pass" => Ok(Polarity::Pass),
            "invert" => Ok(Polarity::Invert),
            _ => Err(()),
        }
    }
}

/// Waveform plus its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationSettings {
    pub waveform: Waveform,
    /// Target frequency in Hz, 0..=10000.
    pub frequency_hz: f64,
    /// Fraction of each cycle spent at nonzero power, 0..=100.
    pub duty_percent: f64,
}

impl Default for ModulationSettings {
    fn default() -> Self {
        Self {
            waveform: Waveform::None,
            frequency_hz: 0.0,
            duty_percent: 0.0,
        }
    }
}

/// The single shared device state, guarded by the engine's lock.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    /// Laser power as a percentage of full scale.
    pub power_percent: f64,
    pub operation_mode: OperationMode,
    pub modulation: ModulationSettings,
    pub polarity: Polarity,
    /// Camera trigger threshold as a percentage of DAC full scale.
    pub trigger_threshold: f64,
    /// Validation policy: reject out-of-range arguments instead of clamping.
    pub strict: bool,
}

impl DeviceState {
    pub fn new(strict: bool) -> Self {
        Self {
            power_percent: 0.0,
            operation_mode: OperationMode::Indep,
            modulation: ModulationSettings::default(),
            polarity: Polarity::Pass,
            trigger_threshold: 0.0,
            strict,
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Format a numeric state value for query payloads: integral values print
/// without a fractional part (`50`, not `50.0`).
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_hardware_safe() {
        let state = DeviceState::default();
        assert_eq!(state.power_percent, 0.0);
        assert_eq!(state.operation_mode, OperationMode::Indep);
        assert_eq!(state.modulation.waveform, Waveform::None);
        assert_eq!(state.polarity, Polarity::Pass);
        assert_eq!(state.trigger_threshold, 0.0);
        assert!(state.strict);
    }

    #[test]
    fn tokens_round_trip() {
        for mode in [OperationMode::Gated, OperationMode::Master, OperationMode::Indep] {
            assert_eq!(mode.to_string().parse::<OperationMode>(), Ok(mode));
        }
        for waveform in [
            Waveform::None,
            Waveform::Sine,
            Waveform::Square,
            Waveform::Triangle,
            Waveform::Sawtooth,
            Waveform::Full,
        ] {
            assert_eq!(waveform.to_string().parse::<Waveform>(), Ok(waveform));
        }
    }

    #[test]
    fn numbers_format_without_trailing_zero() {
        assert_eq!(format_number(50.0), "50");
        assert_eq!(format_number(42.5), "42.5");
        assert_eq!(format_number(0.0), "0");
    }
}
