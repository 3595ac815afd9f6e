//! Hardware layer: capability traits, real drivers, and mocks.
//!
//! The real drivers are thin transport wrappers; every piece of protocol
//! logic lives above the capability boundary.

pub mod capabilities;
pub mod mock;

#[cfg(feature = "instrument_serial")]
pub mod arduino;
#[cfg(feature = "instrument_serial")]
pub mod bioray;

#[cfg(feature = "hardware_gpio")]
pub mod gpio;

pub use capabilities::{DeviceHandles, DeviceResult, LaserLink, ModulationControl, SafetyInputs};
