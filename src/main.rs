//! Server binary: configuration, hardware construction, lifecycle.

use anyhow::{Context, Result};
use clap::Parser;
use laser_server::config::Settings;
use laser_server::engine::Engine;
use laser_server::hardware::capabilities::DeviceHandles;
use laser_server::server;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Networked control server for a modulated laser system")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Run against simulated hardware instead of the real devices.
    #[arg(long)]
    mock: bool,

    /// Start with lenient validation (clamp out-of-range arguments).
    #[arg(long)]
    lenient: bool,
}

fn build_mock_handles() -> DeviceHandles {
    let (handles, ..) = laser_server::hardware::mock::mock_handles();
    handles
}

#[cfg(feature = "instrument_serial")]
fn build_real_handles(settings: &Settings) -> Result<DeviceHandles> {
    use laser_server::hardware::arduino::ArduinoLink;
    use laser_server::hardware::bioray::BioRayLink;

    let laser = Arc::new(BioRayLink::new(
        &settings.laser.port,
        settings.laser.baud_rate,
        settings.laser.timeout(),
    ));
    let modulator = Arc::new(ArduinoLink::new(
        &settings.modulator.port,
        settings.modulator.baud_rate,
        settings.modulator.timeout(),
    ));

    #[cfg(feature = "hardware_gpio")]
    {
        use laser_server::hardware::gpio::GpioSafetyInputs;
        let safety = Arc::new(
            GpioSafetyInputs::new(settings.safety.interlock_pin, settings.safety.override_pin)
                .context("Failed to claim safety input pins")?,
        );
        Ok(DeviceHandles::new(laser, modulator, safety))
    }

    #[cfg(not(feature = "hardware_gpio"))]
    {
        let _ = (laser, modulator);
        anyhow::bail!(laser_server::error::ServerError::FeatureNotEnabled(
            "hardware_gpio".to_string()
        ))
    }
}

#[cfg(not(feature = "instrument_serial"))]
fn build_real_handles(_settings: &Settings) -> Result<DeviceHandles> {
    anyhow::bail!(laser_server::error::ServerError::FeatureNotEnabled(
        "instrument_serial".to_string()
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut settings =
        Settings::new(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = cli.bind {
        settings.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if cli.lenient {
        settings.strict_mode = false;
    }

    let handles = if cli.mock {
        info!("using simulated hardware");
        build_mock_handles()
    } else {
        build_real_handles(&settings)?
    };

    // Return the modulation controller to its power-on state before
    // accepting any commands.
    if let Err(err) = handles.modulator.reset().await {
        warn!(%err, "controller reset failed at startup");
    }

    let engine = Arc::new(Engine::new(handles, settings.strict_mode));
    let addr: SocketAddr = format!("{}:{}", settings.server.bind_address, settings.server.port)
        .parse()
        .context("Invalid bind address")?;

    let serve = server::run(engine.clone(), addr);
    tokio::select! {
        result = serve => {
            if let Err(err) = result {
                error!(%err, "server stopped");
                return Err(err);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    // Hardware back to a safe state before exit.
    if let Err(err) = engine.safe_down().await {
        warn!(%err, "safe shutdown incomplete");
    }
    info!("server closed");
    Ok(())
}
