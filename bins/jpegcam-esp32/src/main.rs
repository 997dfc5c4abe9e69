//! jpegcam firmware for ESP32-CAM
//!
//! Joins WiFi, brings up the camera and serves `/` and `/jpg` on port 80.
//! Requests are answered on the HTTP server's task while the main task keeps
//! watching the WiFi link. Any fatal condition ends in a full chip restart.
//!
//! Build with credentials in the environment:
//!
//! ```text
//! WIFI_SSID=myssid WIFI_PASS=secret cargo build --release
//! ```

use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use jpegcam_core::{boot, StdClock, SupervisorLoop};
use jpegcam_esp32::http::CameraServer;
use jpegcam_esp32::{camera::EspCamera, config, system::restart, wifi::EspWifiLink};
use log::info;

fn main() {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    info!("jpegcam v{} starting...", env!("CARGO_PKG_VERSION"));

    // Only returns by restarting the chip.
    match run() {
        Ok(fatal) => restart(fatal),
        Err(e) => restart(format!("Startup failed: {:#}", e)),
    }
}

fn run() -> anyhow::Result<jpegcam_core::Fatal> {
    let config = config::device_config(option_env!("WIFI_SSID"), option_env!("WIFI_PASS"))?;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let link = EspWifiLink::new(peripherals.modem, sysloop, nvs)?;
    let clock = StdClock::new();

    let booted = match boot(&config, link, EspCamera::new(), clock) {
        Ok(booted) => booted,
        Err(fatal) => return Ok(fatal),
    };

    let server = CameraServer::start(booted.frames, &config.server, clock)?;
    info!("Ready! Open http://{}/ in a browser", booted.network.ip);

    Ok(SupervisorLoop::new(booted.connectivity, server, &config.server, clock).run())
}
