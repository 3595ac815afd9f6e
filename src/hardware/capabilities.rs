//! Device capability traits.
//!
//! The protocol engine never talks to hardware directly; it consumes the
//! narrow capability contracts defined here. Each trait covers one concern:
//!
//! - [`LaserLink`]: the request/acknowledge serial sub-protocol to the laser
//!   head itself.
//! - [`ModulationControl`]: register-style writes to the modulation
//!   controller (power DAC, operation/modulation switching, trigger
//!   threshold, reset sequencing).
//! - [`SafetyInputs`]: instantaneous digital reads of the interlock and
//!   override lines.
//!
//! Every trait is `Send + Sync`, async where I/O is involved, and returns
//! [`DeviceError`] values rather than letting transport faults escape. Mock
//! implementations live in [`crate::hardware::mock`]; real drivers are thin
//! wrappers and carry no protocol logic.

use crate::error::DeviceError;
use crate::state::{ModulationSettings, OperationMode, Polarity};
use async_trait::async_trait;
use std::sync::Arc;

/// Result type for device-capability calls.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Serial request/acknowledge link to the laser head.
#[async_trait]
pub trait LaserLink: Send + Sync {
    /// Send one command line to the head and wait for its acknowledged
    /// reply. Returns the head's reply payload, or the transport/device
    /// failure mapped to a [`DeviceError`].
    async fn transact(&self, command: &str) -> DeviceResult<String>;
}

/// Control surface of the modulation/trigger controller.
#[async_trait]
pub trait ModulationControl: Send + Sync {
    async fn set_laser_power(&self, percent: f64) -> DeviceResult<()>;
    async fn set_operation_mode(&self, mode: OperationMode) -> DeviceResult<()>;
    async fn set_modulation(&self, settings: &ModulationSettings) -> DeviceResult<()>;
    async fn set_polarity(&self, polarity: Polarity) -> DeviceResult<()>;
    async fn set_trigger_threshold(&self, percent: f64) -> DeviceResult<()>;
    /// Reset the controller to its power-on state.
    async fn reset(&self) -> DeviceResult<()>;
}

/// Live digital reads of the safety lines. Infallible: a read is a pin
/// level, and a disconnected line reads as open (the safe direction).
pub trait SafetyInputs: Send + Sync {
    fn interlock_closed(&self) -> bool;
    fn override_asserted(&self) -> bool;
}

/// Aggregate of the capability handles a command engine operates on.
#[derive(Clone)]
pub struct DeviceHandles {
    pub laser: Arc<dyn LaserLink>,
    pub modulator: Arc<dyn ModulationControl>,
    pub safety: Arc<dyn SafetyInputs>,
}

impl DeviceHandles {
    pub fn new(
        laser: Arc<dyn LaserLink>,
        modulator: Arc<dyn ModulationControl>,
        safety: Arc<dyn SafetyInputs>,
    ) -> Self {
        Self {
            laser,
            modulator,
            safety,
        }
    }
}
