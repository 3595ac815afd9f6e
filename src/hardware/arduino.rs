//! Arduino modulation controller link.
//!
//! The controller firmware speaks a one-line keyword protocol at 9600 baud:
//!
//! ```text
//! PWR <percent>            set the power DAC
//! OPM <gated|master|indep> select the operation-mode switch lines
//! MOD <waveform> <hz> <duty> select waveform and program the generator
//! POL <pass|invert>        set modulation polarity
//! TRIG <percent>           set the camera trigger threshold
//! RST                      return to the power-on state
//! ```
//!
//! Every command is acknowledged with a single `OK` line; anything else is
//! an unexpected response. Port handling mirrors [`super::bioray`]: lazy
//! open, exclusive access per transaction, reconnect after transport faults.

use crate::error::DeviceError;
use crate::hardware::capabilities::{DeviceResult, ModulationControl};
use crate::state::{ModulationSettings, OperationMode, Polarity};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

pub struct ArduinoLink {
    port_path: String,
    baud_rate: u32,
    timeout: Duration,
    port: Mutex<Option<SerialStream>>,
}

impl ArduinoLink {
    pub fn new(port_path: &str, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            port_path: port_path.to_string(),
            baud_rate,
            timeout,
            port: Mutex::new(None),
        }
    }

    fn open(&self) -> DeviceResult<SerialStream> {
        tokio_serial::new(&self.port_path, self.baud_rate)
            .open_native_async()
            .map_err(|err| DeviceError::PortUnavailable(err.to_string()))
    }

    /// Send one command line and require an `OK` acknowledgement.
    async fn command(&self, line: &str) -> DeviceResult<()> {
        let mut guard = self.port.lock().await;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        let Some(port) = guard.as_mut() else {
            return Err(DeviceError::Port("serial port unavailable".to_string()));
        };

        if let Err(err) = port.write_all(format!("{line}\r\n").as_bytes()).await {
            *guard = None;
            return Err(DeviceError::Port(err.to_string()));
        }
        debug!(line, "sent controller command");

        let deadline = Instant::now() + self.timeout;
        let mut collected = Vec::with_capacity(16);
        let mut buf = [0u8; 16];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DeviceError::Timeout(format!(
                    "no acknowledgement from controller within {:?}",
                    self.timeout
                )));
            }

            match tokio::time::timeout(remaining, port.read(&mut buf)).await {
                Err(_) => {
                    return Err(DeviceError::Timeout(format!(
                        "no acknowledgement from controller within {:?}",
                        self.timeout
                    )));
                }
                Ok(Err(err)) => {
                    *guard = None;
                    return Err(DeviceError::Port(err.to_string()));
                }
                Ok(Ok(0)) => {
                    *guard = None;
                    return Err(DeviceError::Port("serial port closed".to_string()));
                }
                Ok(Ok(n)) => {
                    collected.extend_from_slice(&buf[..n]);
                    if collected.contains(&b'\n') {
                        let reply = String::from_utf8_lossy(&collected);
                        let reply = reply.trim();
                        if reply == "OK" {
                            return Ok(());
                        }
                        return Err(DeviceError::AuxRejected(reply.to_string()));
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ModulationControl for ArduinoLink {
    async fn set_laser_power(&self, percent: f64) -> DeviceResult<()> {
        self.command(&format!("PWR {percent}")).await
    }

    async fn set_operation_mode(&self, mode: OperationMode) -> DeviceResult<()> {
        self.command(&format!("OPM {mode}")).await
    }

    async fn set_modulation(&self, settings: &ModulationSettings) -> DeviceResult<()> {
        self.command(&format!(
            "MOD {} {} {}",
            settings.waveform, settings.frequency_hz, settings.duty_percent
        ))
        .await
    }

    async fn set_polarity(&self, polarity: Polarity) -> DeviceResult<()> {
        self.command(&format!("POL {polarity}")).await
    }

    async fn set_trigger_threshold(&self, percent: f64) -> DeviceResult<()> {
        self.command(&format!("TRIG {percent}")).await
    }

    async fn reset(&self) -> DeviceResult<()> {
        self.command("RST").await
    }
}
