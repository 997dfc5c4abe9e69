//! Device configuration for ESP32-CAM boards.
//!
//! Credentials are baked into the firmware at build time; everything else
//! comes from the core defaults plus the pin map of the selected board.

use anyhow::{Context, Result};
use jpegcam_core::{CameraPins, DeviceConfig, WifiConfig};
use log::info;

/// Pin map of the board selected through cargo features.
pub const fn board_pins() -> CameraPins {
    if cfg!(feature = "board-wrover-kit") {
        CameraPins::wrover_kit()
    } else {
        CameraPins::ai_thinker()
    }
}

/// Build and validate the device configuration.
///
/// `ssid` and `password` are normally `option_env!("WIFI_SSID")` and
/// `option_env!("WIFI_PASS")` captured by the firmware binary.
pub fn device_config(ssid: Option<&str>, password: Option<&str>) -> Result<DeviceConfig> {
    let mut config = DeviceConfig {
        wifi: WifiConfig::new(ssid.unwrap_or_default(), password.unwrap_or_default()),
        ..Default::default()
    };
    config.camera.pins = board_pins();

    config
        .validate()
        .context("Set WIFI_SSID and WIFI_PASS when building the firmware")?;

    let (width, height) = config.camera.frame_size.dimensions();
    info!(
        "Config: ssid '{}', {}x{} JPEG q{}, port {}",
        config.wifi.ssid, width, height, config.camera.jpeg_quality, config.server.port
    );
    Ok(config)
}
