//! Command dispatch engine.
//!
//! One `Engine` is shared by every connection worker. It owns the device
//! state behind a read/write lock and runs the mutating-command pipeline:
//!
//! 1. validate arguments against the rule's signature
//! 2. check the safety interlock (refuse on open, warn on override)
//! 3. command-specific preconditions (no-effect, mode compatibility)
//! 4. at most one device-capability call
//! 5. atomic state update
//! 6. compose accumulated warnings; a device failure overrides them all
//!
//! The whole pipeline holds the mutation gate so at most one mutating
//! command applies hardware side effects at a time. The state lock itself
//! is scoped to state access only; the device call runs outside it, so a
//! hung serial transaction cannot starve concurrent queries. A query during
//! that window may observe the pre-update value, which is accepted.

use crate::hardware::capabilities::DeviceHandles;
use crate::interlock::InterlockStatus;
use crate::protocol::codes::{Code, Reply};
use crate::protocol::validate::{validate, ArgValue};
use crate::rulebook::{self, CommandOp, QueryOp, Rule};
use crate::state::{format_number, DeviceState, ModulationSettings, OperationMode, Polarity, Waveform};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub struct Engine {
    device: DeviceHandles,
    state: RwLock<DeviceState>,
    mutation_gate: Mutex<()>,
}

fn device_failure(err: crate::error::DeviceError) -> Reply {
    Reply::Failed {
        code: err.code(),
        detail: Some(err.detail()),
    }
}

impl Engine {
    pub fn new(device: DeviceHandles, strict: bool) -> Self {
        Self {
            device,
            state: RwLock::new(DeviceState::new(strict)),
            mutation_gate: Mutex::new(()),
        }
    }

    /// Snapshot of the current device state.
    pub async fn state(&self) -> DeviceState {
        self.state.read().await.clone()
    }

    /// Execute one tokenized request and produce its reply. `tokens` is
    /// non-empty (framing rejects empty messages).
    pub async fn dispatch(&self, tokens: &[String]) -> Reply {
        let Some((verb, args)) = tokens.split_first() else {
            return Reply::failed(Code::NoCommand);
        };

        match rulebook::resolve(verb) {
            None => Reply::failed(Code::UnknownCommand),
            Some(Rule::Query(op)) => {
                // Queries take no arguments.
                if !args.is_empty() {
                    return Reply::failed(Code::TooManyArgs);
                }
                self.run_query(op).await
            }
            Some(Rule::Command { op, signature }) => self.run_command(op, signature, args).await,
        }
    }

    async fn run_command(
        &self,
        op: CommandOp,
        signature: &'static [crate::protocol::validate::ArgSpec],
        args: &[String],
    ) -> Reply {
        // Serialize the whole mutating pipeline across connections.
        let _gate = self.mutation_gate.lock().await;

        let strict = self.state.read().await.strict;
        let parsed = match validate(args, signature, strict) {
            Ok(parsed) => parsed,
            Err(code) => return Reply::failed(code),
        };

        let mut warnings = Vec::new();
        if parsed.clamped {
            warnings.push(Code::Clamped);
        }

        match InterlockStatus::read(self.device.safety.as_ref()).gate() {
            Ok(None) => {}
            Ok(Some(code)) => {
                warn!(?op, "interlock open, operating under override");
                warnings.push(code);
            }
            Err(code) => {
                warn!(?op, "interlock open, command refused");
                return Reply::failed(code);
            }
        }

        self.apply(op, &parsed.values, warnings).await
    }

    /// Steps 3-6 of the pipeline for each mutating operation.
    async fn apply(&self, op: CommandOp, values: &[ArgValue], mut warnings: Vec<Code>) -> Reply {
        match op {
            CommandOp::LaserMains => {
                let requested = values[0].token().to_ascii_uppercase();
                let current = match self.device.laser.transact("SOUR:AM:STAT?").await {
                    Ok(reply) => reply,
                    Err(err) => return device_failure(err),
                };
                if current.eq_ignore_ascii_case(&requested) {
                    warnings.push(Code::NoEffect);
                } else if let Err(err) = self
                    .device
                    .laser
                    .transact(&format!("SOUR:AM:STAT {requested}"))
                    .await
                {
                    return device_failure(err);
                } else {
                    info!(mains = %requested, "laser mains switched");
                }
                Reply::Done { warnings }
            }

            CommandOp::LaserPower => {
                let requested = values[0].number();
                let current = self.state.read().await.power_percent;
                if requested == current {
                    warnings.push(Code::NoEffect);
                } else {
                    if let Err(err) = self.device.modulator.set_laser_power(requested).await {
                        return device_failure(err);
                    }
                    self.state.write().await.power_percent = requested;
                    info!(percent = requested, "laser power set");
                }
                Reply::Done { warnings }
            }

            CommandOp::LaserMode => {
                let Ok(mode) = values[0].token().parse::<OperationMode>() else {
                    return Reply::failed(Code::ArgNotRecognized);
                };
                let snapshot = self.state.read().await.clone();
                // Gated and master triggering need an active waveform.
                if mode != OperationMode::Indep && snapshot.modulation.waveform == Waveform::None {
                    return Reply::failed(Code::ModeConflict);
                }
                if snapshot.operation_mode == mode {
                    warnings.push(Code::NoEffect);
                } else {
                    if let Err(err) = self.device.modulator.set_operation_mode(mode).await {
                        return device_failure(err);
                    }
                    self.state.write().await.operation_mode = mode;
                    info!(%mode, "operation mode set");
                }
                Reply::Done { warnings }
            }

            CommandOp::ModPolarity => {
                let Ok(polarity) = values[0].token().parse::<Polarity>() else {
                    return Reply::failed(Code::ArgNotRecognized);
                };
                let current = self.state.read().await.polarity;
                if current == polarity {
                    warnings.push(Code::NoEffect);
                } else {
                    if let Err(err) = self.device.modulator.set_polarity(polarity).await {
                        return device_failure(err);
                    }
                    self.state.write().await.polarity = polarity;
                    info!(%polarity, "modulation polarity set");
                }
                Reply::Done { warnings }
            }

            CommandOp::Modulation => {
                let Ok(waveform) = values[0].token().parse::<Waveform>() else {
                    return Reply::failed(Code::ArgNotRecognized);
                };
                let settings = ModulationSettings {
                    waveform,
                    frequency_hz: values[1].number(),
                    duty_percent: values[2].number(),
                };
                let snapshot = self.state.read().await.clone();
                // Dropping to no waveform while gated/master would recreate
                // the forbidden mode pairing through the other door.
                if waveform == Waveform::None && snapshot.operation_mode != OperationMode::Indep {
                    return Reply::failed(Code::ModeConflict);
                }
                if snapshot.modulation == settings {
                    warnings.push(Code::NoEffect);
                } else {
                    if let Err(err) = self.device.modulator.set_modulation(&settings).await {
                        return device_failure(err);
                    }
                    self.state.write().await.modulation = settings;
                    info!(
                        waveform = %settings.waveform,
                        frequency_hz = settings.frequency_hz,
                        duty_percent = settings.duty_percent,
                        "modulation set"
                    );
                }
                Reply::Done { warnings }
            }

            CommandOp::TriggerThreshold => {
                let requested = values[0].number();
                let current = self.state.read().await.trigger_threshold;
                if requested == current {
                    warnings.push(Code::NoEffect);
                } else {
                    if let Err(err) = self.device.modulator.set_trigger_threshold(requested).await {
                        return device_failure(err);
                    }
                    self.state.write().await.trigger_threshold = requested;
                    info!(percent = requested, "trigger threshold set");
                }
                Reply::Done { warnings }
            }

            CommandOp::StrictMode => {
                let requested = values[0].token() == "on";
                let current = self.state.read().await.strict;
                if current == requested {
                    warnings.push(Code::NoEffect);
                } else {
                    // Policy toggle only; no hardware is involved.
                    self.state.write().await.strict = requested;
                    info!(strict = requested, "validation policy set");
                }
                Reply::Done { warnings }
            }
        }
    }

    async fn run_query(&self, op: QueryOp) -> Reply {
        use QueryOp as Q;

        match op {
            Q::LaserMains => self.laser_query("SOUR:AM:STAT?").await,
            Q::LaserStatus => self.laser_query("SYST:STAT?").await,
            Q::LaserFault => self.laser_query("SYST:FAUL?").await,
            Q::PowerNow => self.laser_query("SOUR:POW:LEV?").await,
            Q::PowerMax => self.laser_query("SOUR:POW:LIM:HIGH?").await,
            Q::PowerNominal => self.laser_query("SOUR:POW:NOM?").await,
            Q::AmpsNow => self.laser_query("SOUR:CURR:LEV?").await,
            Q::TempInternal => self.laser_query("SYST:TEMP:INT?").await,
            Q::TempDiode => self.laser_query("SYST:TEMP:DIOD?").await,
            Q::TempDiodeMax => self.laser_query("SYST:TEMP:DIOD:MAX?").await,
            Q::TempDiodeMin => self.laser_query("SYST:TEMP:DIOD:MIN?").await,
            Q::InfoLaser => self.laser_query("*IDN?").await,

            Q::InfoServer => Reply::Payload(format!(
                "{} {} | networked laser instrument server",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            )),

            Q::LaserPower => {
                Reply::Payload(format_number(self.state.read().await.power_percent))
            }
            Q::LaserMode => Reply::Payload(self.state.read().await.operation_mode.to_string()),
            Q::ModPolarity => Reply::Payload(self.state.read().await.polarity.to_string()),
            Q::Modulation => {
                let modulation = self.state.read().await.modulation;
                Reply::Payload(format!(
                    "{} {} {}",
                    modulation.waveform,
                    format_number(modulation.frequency_hz),
                    format_number(modulation.duty_percent)
                ))
            }
            Q::TriggerThreshold => {
                Reply::Payload(format_number(self.state.read().await.trigger_threshold))
            }
            Q::StrictMode => {
                let strict = self.state.read().await.strict;
                Reply::Payload(if strict { "on" } else { "off" }.to_string())
            }

            Q::InterlockStatus => {
                let closed = self.device.safety.interlock_closed();
                Reply::Payload(if closed { "closed" } else { "open" }.to_string())
            }
            Q::InterlockOverride => {
                let asserted = self.device.safety.override_asserted();
                Reply::Payload(if asserted { "on" } else { "off" }.to_string())
            }
        }
    }

    async fn laser_query(&self, command: &str) -> Reply {
        match self.device.laser.transact(command).await {
            Ok(payload) => Reply::Payload(payload),
            Err(err) => device_failure(err),
        }
    }

    /// Best-effort return to a hardware-safe state: power zero, modulation
    /// off. Used at shutdown.
    pub async fn safe_down(&self) -> Result<(), crate::error::DeviceError> {
        self.device.modulator.set_laser_power(0.0).await?;
        self.device
            .modulator
            .set_modulation(&ModulationSettings::default())
            .await?;
        let mut state = self.state.write().await;
        state.power_percent = 0.0;
        state.modulation = ModulationSettings::default();
        Ok(())
    }
}
