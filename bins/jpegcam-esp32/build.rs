//! Build script for the jpegcam ESP32 firmware
//!
//! This script sets up the ESP-IDF environment variables needed for compilation.

fn main() {
    // Output ESP-IDF environment configuration
    // This is required for the esp-idf-svc crate to find the IDF toolchain
    embuild::espidf::sysenv::output();

    // Credentials are baked in at build time
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASS");
}
