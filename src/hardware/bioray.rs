//! Coherent BioRay laser head serial link.
//!
//! Protocol: ASCII command lines terminated by CRLF at 115200 8N1. The head
//! answers every command with up to two lines: an optional reply payload
//! followed by a handshake line, `OK` on acceptance or `ERR...` on
//! rejection.
//!
//! The port is opened lazily on first use and held open across commands
//! behind a `Mutex` for exclusive access during a transaction. A transport
//! fault closes the port so the next transaction reconnects.

use crate::error::DeviceError;
use crate::hardware::capabilities::{DeviceResult, LaserLink};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

pub struct BioRayLink {
    port_path: String,
    baud_rate: u32,
    timeout: Duration,
    port: Mutex<Option<SerialStream>>,
}

impl BioRayLink {
    /// Create a link to the head on `port_path`. The port itself is opened
    /// on the first transaction, so construction cannot fail; an unreachable
    /// port surfaces per-command as a connect error.
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
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .open_native_async()
            .map_err(|err| DeviceError::PortUnavailable(err.to_string()))
    }
}

/// Scan the collected bytes for a completed handshake line.
///
/// Returns `None` until a full `OK`/`ERR` line has arrived. On `OK` the
/// payload is the line preceding the handshake (empty for bare
/// acknowledgements); on `ERR` the handshake line itself is the fault text.
fn parse_reply(collected: &[u8]) -> Option<DeviceResult<String>> {
    let text = String::from_utf8_lossy(collected);
    // Only lines followed by a newline are complete.
    let complete: Vec<&str> = match text.rfind('\n') {
        Some(end) => text[..end].lines().map(str::trim).filter(|l| !l.is_empty()).collect(),
        None => return None,
    };

    match complete.last() {
        Some(&"OK") => {
            let payload = if complete.len() >= 2 { complete[0] } else { "" };
            Some(Ok(payload.to_string()))
        }
        Some(line) if line.starts_with("ERR") => {
            Some(Err(DeviceError::LaserFault((*line).to_string())))
        }
        _ => None,
    }
}

#[async_trait]
impl LaserLink for BioRayLink {
    async fn transact(&self, command: &str) -> DeviceResult<String> {
        let mut guard = self.port.lock().await;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        let Some(port) = guard.as_mut() else {
            return Err(DeviceError::Port("serial port unavailable".to_string()));
        };

        if let Err(err) = port.write_all(format!("{command}\r\n").as_bytes()).await {
            *guard = None;
            return Err(DeviceError::Port(err.to_string()));
        }
        debug!(command, "sent laser command");

        let deadline = Instant::now() + self.timeout;
        let mut collected = Vec::with_capacity(64);
        let mut buf = [0u8; 64];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DeviceError::Timeout(format!(
                    "no handshake from laser within {:?}",
                    self.timeout
                )));
            }

            match tokio::time::timeout(remaining, port.read(&mut buf)).await {
                Err(_) => {
                    return Err(DeviceError::Timeout(format!(
                        "no handshake from laser within {:?}",
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
                    if let Some(result) = parse_reply(&collected) {
                        if let Ok(payload) = &result {
                            debug!(payload, "laser acknowledged");
                        }
                        return result;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_reply_keeps_reading() {
        assert!(parse_reply(b"").is_none());
        assert!(parse_reply(b"ON\r\n").is_none());
        assert!(parse_reply(b"ON\r\nOK").is_none());
    }

    #[test]
    fn ok_handshake_yields_payload() {
        let reply = parse_reply(b"ON\r\nOK\r\n").unwrap().unwrap();
        assert_eq!(reply, "ON");
    }

    #[test]
    fn bare_ok_yields_empty_payload() {
        let reply = parse_reply(b"OK\r\n").unwrap().unwrap();
        assert_eq!(reply, "");
    }

    #[test]
    fn err_handshake_yields_fault_with_text() {
        let err = parse_reply(b"ERR-100\r\n").unwrap().unwrap_err();
        assert_eq!(err.detail(), "ERR-100");
    }
}
