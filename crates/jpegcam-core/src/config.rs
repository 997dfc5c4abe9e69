//! Device configuration.
//!
//! All settings are gathered into one immutable [`DeviceConfig`] that is built
//! at boot and handed to each component at construction:
//! - ESP32: credentials baked in at build time, everything else from defaults
//! - Linux: optional JSON file plus environment overrides
//!
//! Defaults carry the reference values of an AI Thinker ESP32-CAM board.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Maximum SSID length accepted by the radio driver.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA2 passphrase length accepted by the radio driver.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("Invalid configuration data: {0}")]
    InvalidData(String),

    /// A field holds a value the device cannot use.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Complete device configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceConfig {
    pub wifi: WifiConfig,
    pub camera: CameraConfig,
    pub server: ServerConfig,
}

impl DeviceConfig {
    /// Parse a JSON document. Missing fields fall back to their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::InvalidData(e.to_string()))
    }

    /// Check every section for values the hardware cannot accept.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.wifi.validate()?;
        self.camera.validate()?;
        self.server.validate()
    }
}

// ============================================================================
// WiFi
// ============================================================================

/// Station-mode WiFi settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WifiConfig {
    /// Network SSID (cannot be empty).
    pub ssid: String,

    /// WPA2 passphrase (empty for open networks).
    pub password: String,

    /// Give up associating after this long.
    pub connect_timeout_ms: u64,

    /// Interval between association status checks.
    pub poll_interval_ms: u64,

    /// Maximum transmit power in units of 0.25 dBm.
    pub tx_power_quarter_dbm: i8,

    /// Modem power save. Off by default since it adds frame latency.
    pub power_save: bool,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            connect_timeout_ms: 20_000,
            poll_interval_ms: 500,
            // 19.5 dBm
            tx_power_quarter_dbm: 78,
            power_save: false,
        }
    }
}

// Hand-written so the passphrase never ends up in a log line.
impl std::fmt::Debug for WifiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiConfig")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("tx_power_quarter_dbm", &self.tx_power_quarter_dbm)
            .field("power_save", &self.power_save)
            .finish()
    }
}

impl WifiConfig {
    /// Credentials with every other setting at its default.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Transmit power in dBm.
    pub fn tx_power_dbm(&self) -> f32 {
        f32::from(self.tx_power_quarter_dbm) / 4.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::invalid("wifi.ssid", "cannot be empty"));
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::invalid(
                "wifi.ssid",
                format!("longer than {} bytes", MAX_SSID_LEN),
            ));
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(ConfigError::invalid(
                "wifi.password",
                format!("longer than {} bytes", MAX_PASSWORD_LEN),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("wifi.pollIntervalMs", "must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Sensor output resolutions supported by the camera driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameSize {
    Qqvga,
    Qvga,
    Cif,
    Vga,
    Svga,
    Xga,
    Sxga,
    Uxga,
}

impl FrameSize {
    /// Width and height in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            FrameSize::Qqvga => (160, 120),
            FrameSize::Qvga => (320, 240),
            FrameSize::Cif => (400, 296),
            FrameSize::Vga => (640, 480),
            FrameSize::Svga => (800, 600),
            FrameSize::Xga => (1024, 768),
            FrameSize::Sxga => (1280, 1024),
            FrameSize::Uxga => (1600, 1200),
        }
    }
}

/// GPIO assignment for the parallel camera interface.
///
/// `-1` marks a pin that is not wired on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPins {
    pub pwdn: i32,
    pub reset: i32,
    pub xclk: i32,
    pub sccb_sda: i32,
    pub sccb_scl: i32,
    /// Data lines D0..D7 (silkscreened Y2..Y9 on most boards).
    pub data: [i32; 8],
    pub vsync: i32,
    pub href: i32,
    pub pclk: i32,
}

impl CameraPins {
    /// AI Thinker ESP32-CAM.
    pub const fn ai_thinker() -> Self {
        Self {
            pwdn: 32,
            reset: -1,
            xclk: 0,
            sccb_sda: 26,
            sccb_scl: 27,
            data: [5, 18, 19, 21, 36, 39, 34, 35],
            vsync: 25,
            href: 23,
            pclk: 22,
        }
    }

    /// Freenove / ESP-WROVER-KIT.
    pub const fn wrover_kit() -> Self {
        Self {
            pwdn: -1,
            reset: -1,
            xclk: 21,
            sccb_sda: 26,
            sccb_scl: 27,
            data: [4, 5, 18, 19, 36, 39, 34, 35],
            vsync: 25,
            href: 23,
            pclk: 22,
        }
    }
}

impl Default for CameraPins {
    fn default() -> Self {
        Self::ai_thinker()
    }
}

/// Imaging hardware settings applied once at initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraConfig {
    pub pins: CameraPins,

    /// Sensor clock frequency.
    pub xclk_freq_hz: u32,

    pub frame_size: FrameSize,

    /// JPEG quality, 0..=63, lower is better.
    pub jpeg_quality: u8,

    /// Number of driver frame buffers. Only single buffering is supported.
    pub fb_count: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            pins: CameraPins::ai_thinker(),
            xclk_freq_hz: 20_000_000,
            frame_size: FrameSize::Qvga,
            jpeg_quality: 10,
            fb_count: 1,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fb_count != 1 {
            return Err(ConfigError::invalid(
                "camera.fbCount",
                format!("must be 1, got {}", self.fb_count),
            ));
        }
        if self.jpeg_quality > 63 {
            return Err(ConfigError::invalid(
                "camera.jpegQuality",
                format!("must be within 0..=63, got {}", self.jpeg_quality),
            ));
        }
        if self.xclk_freq_hz == 0 {
            return Err(ConfigError::invalid("camera.xclkFreqHz", "must be non-zero"));
        }
        // The driver takes the frequency as a C int.
        if i32::try_from(self.xclk_freq_hz).is_err() {
            return Err(ConfigError::invalid(
                "camera.xclkFreqHz",
                format!("must be at most {}, got {}", i32::MAX, self.xclk_freq_hz),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// HTTP server
// ============================================================================

/// HTTP endpoint and supervisor loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub port: u16,

    /// Largest single socket write while streaming a frame.
    pub chunk_size: usize,

    /// Pause at the bottom of every supervisor iteration.
    pub loop_yield_ms: u64,

    /// How often the viewer page requests a new frame.
    pub refresh_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 80,
            chunk_size: 1024,
            loop_yield_ms: 10,
            refresh_interval_ms: 500,
        }
    }
}

impl ServerConfig {
    pub fn loop_yield(&self) -> Duration {
        Duration::from_millis(self.loop_yield_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::invalid("server.chunkSize", "must be non-zero"));
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "server.refreshIntervalMs",
                "must be non-zero",
            ));
        }
        Ok(())
    }
}
