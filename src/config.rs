//! Layered runtime configuration.
//!
//! Settings come from hardware-safe defaults, an optional TOML file, and
//! `LASER_*` environment variables, merged in that order. The defaults
//! match the instrument rack this server was built for; a different
//! deployment overrides them without recompiling.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Address to bind the listener to.
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialSettings {
    /// Serial port path (e.g. "/dev/ttyUSB0").
    pub port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl SerialSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetySettings {
    /// BCM pin wired to the interlock loop.
    pub interlock_pin: u8,
    /// BCM pin wired to the operator override switch.
    pub override_pin: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    /// Laser head serial link.
    pub laser: SerialSettings,
    /// Modulation controller serial link.
    pub modulator: SerialSettings,
    pub safety: SafetySettings,
    /// Initial validation policy; toggled at runtime via `STRICT_MODE`.
    pub strict_mode: bool,
}

impl Settings {
    /// Load settings, layering an optional file and the environment over
    /// the defaults.
    pub fn new(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.port", 14000)?
            .set_default("laser.port", "/dev/ttyUSB0")?
            .set_default("laser.baud_rate", 115_200)?
            .set_default("laser.timeout_ms", 100)?
            .set_default("modulator.port", "/dev/ttyACM0")?
            .set_default("modulator.baud_rate", 9600)?
            .set_default("modulator.timeout_ms", 1000)?
            .set_default("safety.interlock_pin", 16)?
            .set_default("safety.override_pin", 26)?
            .set_default("strict_mode", true)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder
            .add_source(Environment::with_prefix("LASER").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.server.port, 14000);
        assert_eq!(settings.laser.baud_rate, 115_200);
        assert_eq!(settings.modulator.port, "/dev/ttyACM0");
        assert_eq!(settings.safety.interlock_pin, 16);
        assert!(settings.strict_mode);
    }

    #[test]
    fn serial_timeout_converts_to_duration() {
        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.laser.timeout(), Duration::from_millis(100));
    }
}
