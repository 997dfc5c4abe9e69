//! ESP32-specific components for jpegcam.
//!
//! This crate provides the hardware side of the core traits:
//! - WiFi link (`EspWifiLink`, implements `WifiLink`)
//! - esp32-camera driver binding (`EspCamera`, implements `CameraDriver`)
//! - HTTP front end on `EspHttpServer` (`CameraServer`, implements `RequestService`)
//! - Board pin maps and build-time credentials
//! - Device restart
//!
//! # Architecture
//!
//! All pipeline logic lives in `jpegcam-core` and is identical on Linux.
//! This crate only adapts ESP-IDF services to the core's narrow interfaces.
//!
//! # Example
//!
//! ```ignore
//! use jpegcam_esp32::{camera::EspCamera, http::CameraServer, wifi::EspWifiLink};
//!
//! let link = EspWifiLink::new(peripherals.modem, sysloop, nvs)?;
//! let booted = jpegcam_core::boot(&config, link, EspCamera::new(), clock)?;
//! let server = CameraServer::start(booted.frames, &config.server, clock)?;
//! let fatal = SupervisorLoop::new(booted.connectivity, server, &config.server, clock).run();
//! ```
//!
//! The camera bindings (`esp_idf_svc::sys::camera`) are generated from the
//! `espressif/esp32-camera` component declared in the firmware's Cargo.toml.

pub mod camera;
pub mod config;
pub mod http;
pub mod system;
pub mod wifi;
