//! jpegcam simulator for Linux.
//!
//! Runs the same capture-and-serve loop as the firmware, with JPEG files from
//! a directory standing in for the camera and a loopback link standing in for
//! WiFi. A fatal condition restarts the whole device state in-process.
//!
//! ```text
//! JPEGCAM_FRAMES=./frames JPEGCAM_PORT=8080 cargo run -p jpegcam-host
//! ```

mod camera;
mod link;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use jpegcam_core::{
    boot, DeviceConfig, Fatal, PollingServer, StdClock, SupervisorLoop, TcpAcceptor, WifiConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::camera::FileCamera;
use crate::link::SimulatedLink;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_FRAMES_DIR: &str = "./frames";
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Settings read from the environment at startup.
#[derive(Debug)]
struct HostSettings {
    device: DeviceConfig,
    frames_dir: PathBuf,
    drop_after: Option<u64>,
}

impl HostSettings {
    fn from_env() -> Result<Self> {
        let mut device = match std::env::var("JPEGCAM_CONFIG") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                DeviceConfig::from_json(&text)
                    .with_context(|| format!("Invalid config file {}", path))?
            }
            Err(_) => DeviceConfig {
                wifi: WifiConfig::new("simulated", ""),
                ..Default::default()
            },
        };

        device.server.port = match std::env::var("JPEGCAM_PORT") {
            Ok(port) => port.parse().context("JPEGCAM_PORT must be a port number")?,
            Err(_) if std::env::var("JPEGCAM_CONFIG").is_ok() => device.server.port,
            Err(_) => DEFAULT_PORT,
        };

        let frames_dir = std::env::var("JPEGCAM_FRAMES")
            .unwrap_or_else(|_| DEFAULT_FRAMES_DIR.into())
            .into();

        let drop_after = std::env::var("JPEGCAM_DROP_AFTER")
            .ok()
            .map(|n| n.parse())
            .transpose()
            .context("JPEGCAM_DROP_AFTER must be a number of loop iterations")?;

        device.validate()?;
        Ok(Self {
            device,
            frames_dir,
            drop_after,
        })
    }
}

/// One power cycle: boot, serve until something fatal happens.
fn run_device(settings: &HostSettings) -> Result<Fatal> {
    let config = &settings.device;
    let clock = StdClock::new();
    let link = SimulatedLink::new(settings.drop_after);
    let camera = FileCamera::new(&settings.frames_dir);

    let booted = match boot(config, link, camera, clock) {
        Ok(booted) => booted,
        Err(fatal) => return Ok(fatal),
    };

    let acceptor = TcpAcceptor::bind(config.server.port)
        .with_context(|| format!("Failed to bind port {}", config.server.port))?;
    tracing::info!(
        "Ready! Open http://localhost:{}/ in a browser",
        acceptor.local_addr()?.port()
    );

    let server = PollingServer::new(acceptor, booted.frames, &config.server, clock);
    Ok(SupervisorLoop::new(booted.connectivity, server, &config.server, clock).run())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,jpegcam_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("jpegcam simulator v{} starting...", env!("CARGO_PKG_VERSION"));

    let settings = HostSettings::from_env()?;
    tracing::info!(
        frames = %settings.frames_dir.display(),
        drop_after = ?settings.drop_after,
        "Simulated device configured"
    );

    let mut boots: u64 = 0;
    loop {
        boots += 1;
        match run_device(&settings) {
            Ok(fatal) => {
                tracing::error!(boot = boots, "{} ({}) - restarting...", fatal, fatal.reason())
            }
            Err(e) => tracing::error!(boot = boots, "Startup failed: {:#} - restarting...", e),
        }
        std::thread::sleep(RESTART_DELAY);
    }
}
