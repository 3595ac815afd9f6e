//! Mock hardware implementations.
//!
//! Simulated devices for running the server without physical hardware
//! (`--mock`) and for tests. All mocks are async-safe and cheap to clone
//! behind `Arc`.
//!
//! - `MockLaser` — keeps the head's mains state in memory and answers the
//!   `SOUR:AM:STAT` family; any other query returns a canned payload. A
//!   fault can be injected so transport-failure paths are testable.
//! - `MockModulator` — acknowledges every control write and records the last
//!   applied values for assertions; individual failure injection.
//! - `MockSafetyInputs` — two atomic flags standing in for the interlock
//!   and override lines.

use crate::error::DeviceError;
use crate::hardware::capabilities::{
    DeviceHandles, DeviceResult, LaserLink, ModulationControl, SafetyInputs,
};
use crate::state::{ModulationSettings, OperationMode, Polarity};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory stand-in for the laser head.
pub struct MockLaser {
    mains_on: Mutex<bool>,
    /// When set, every transaction fails with this fault's clone.
    fault: Mutex<Option<DeviceError>>,
}

impl MockLaser {
    pub fn new() -> Self {
        Self {
            mains_on: Mutex::new(false),
            fault: Mutex::new(None),
        }
    }

    /// Make every subsequent transaction fail with a laser fault carrying
    /// `detail` as its message.
    pub async fn inject_fault(&self, detail: &str) {
        *self.fault.lock().await = Some(DeviceError::LaserFault(detail.to_string()));
    }

    pub async fn clear_fault(&self) {
        *self.fault.lock().await = None;
    }
}

impl Default for MockLaser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LaserLink for MockLaser {
    async fn transact(&self, command: &str) -> DeviceResult<String> {
        if let Some(fault) = &*self.fault.lock().await {
            return Err(DeviceError::LaserFault(fault.detail()));
        }

        match command {
            "SOUR:AM:STAT?" => {
                let on = *self.mains_on.lock().await;
                Ok(if on { "ON" } else { "OFF" }.to_string())
            }
            "SOUR:AM:STAT ON" => {
                *self.mains_on.lock().await = true;
                Ok(String::new())
            }
            "SOUR:AM:STAT OFF" => {
                *self.mains_on.lock().await = false;
                Ok(String::new())
            }
            "*IDN?" => Ok("MOCK,BioRay,0,1.0".to_string()),
            // Every other head query gets a plausible numeric payload.
            _ => Ok("0".to_string()),
        }
    }
}

/// Values most recently applied to the mock modulation controller.
#[derive(Debug, Clone, Default)]
pub struct AppliedState {
    pub power_percent: Option<f64>,
    pub operation_mode: Option<OperationMode>,
    pub modulation: Option<ModulationSettings>,
    pub polarity: Option<Polarity>,
    pub trigger_threshold: Option<f64>,
    pub resets: u32,
}

/// Records control writes instead of driving hardware.
pub struct MockModulator {
    applied: Mutex<AppliedState>,
    fail_next: AtomicBool,
}

impl MockModulator {
    pub fn new() -> Self {
        Self {
            applied: Mutex::new(AppliedState::default()),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Fail the next control write with an auxiliary-controller rejection.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Snapshot of everything applied so far.
    pub async fn applied(&self) -> AppliedState {
        self.applied.lock().await.clone()
    }

    fn check_fault(&self) -> DeviceResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(DeviceError::AuxRejected("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MockModulator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModulationControl for MockModulator {
    async fn set_laser_power(&self, percent: f64) -> DeviceResult<()> {
        self.check_fault()?;
        self.applied.lock().await.power_percent = Some(percent);
        Ok(())
    }

    async fn set_operation_mode(&self, mode: OperationMode) -> DeviceResult<()> {
        self.check_fault()?;
        self.applied.lock().await.operation_mode = Some(mode);
        Ok(())
    }

    async fn set_modulation(&self, settings: &ModulationSettings) -> DeviceResult<()> {
        self.check_fault()?;
        self.applied.lock().await.modulation = Some(*settings);
        Ok(())
    }

    async fn set_polarity(&self, polarity: Polarity) -> DeviceResult<()> {
        self.check_fault()?;
        self.applied.lock().await.polarity = Some(polarity);
        Ok(())
    }

    async fn set_trigger_threshold(&self, percent: f64) -> DeviceResult<()> {
        self.check_fault()?;
        self.applied.lock().await.trigger_threshold = Some(percent);
        Ok(())
    }

    async fn reset(&self) -> DeviceResult<()> {
        self.check_fault()?;
        self.applied.lock().await.resets += 1;
        Ok(())
    }
}

/// Atomic interlock/override lines.
pub struct MockSafetyInputs {
    interlock: AtomicBool,
    override_line: AtomicBool,
}

impl MockSafetyInputs {
    pub fn new(interlock_closed: bool, override_asserted: bool) -> Self {
        Self {
            interlock: AtomicBool::new(interlock_closed),
            override_line: AtomicBool::new(override_asserted),
        }
    }

    pub fn set_interlock(&self, closed: bool) {
        self.interlock.store(closed, Ordering::SeqCst);
    }

    pub fn set_override(&self, asserted: bool) {
        self.override_line.store(asserted, Ordering::SeqCst);
    }
}

impl SafetyInputs for MockSafetyInputs {
    fn interlock_closed(&self) -> bool {
        self.interlock.load(Ordering::SeqCst)
    }

    fn override_asserted(&self) -> bool {
        self.override_line.load(Ordering::SeqCst)
    }
}

/// A full mock device set with the interlock closed: the default harness for
/// tests and `--mock` runs.
pub fn mock_handles() -> (DeviceHandles, Arc<MockLaser>, Arc<MockModulator>, Arc<MockSafetyInputs>) {
    let laser = Arc::new(MockLaser::new());
    let modulator = Arc::new(MockModulator::new());
    let safety = Arc::new(MockSafetyInputs::new(true, false));
    let handles = DeviceHandles::new(laser.clone(), modulator.clone(), safety.clone());
    (handles, laser, modulator, safety)
}
