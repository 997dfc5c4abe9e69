//! WiFi link for ESP32.
//!
//! Implements [`WifiLink`] on top of `EspWifi` without blocking: joining only
//! issues the request, and the core's `ConnectivityManager` does the polling
//! and timeout handling.

use anyhow::{anyhow, Result};
use esp_idf_hal::{delay::FreeRtos, modem::Modem, peripheral};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    sys::{
        esp, esp_wifi_restore, esp_wifi_set_max_tx_power, esp_wifi_set_ps,
        wifi_ps_type_t_WIFI_PS_MIN_MODEM, wifi_ps_type_t_WIFI_PS_NONE,
    },
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};
use jpegcam_core::{ConnectionState, NetworkInfo, WifiLink};
use log::{debug, info};
use std::net::Ipv4Addr;

/// Time the radio is given to settle after dropping an old association.
const RESET_SETTLE_MS: u32 = 1000;

/// Station-mode radio owned by the device for its whole boot.
pub struct EspWifiLink {
    wifi: EspWifi<'static>,
    joining: bool,
}

impl EspWifiLink {
    pub fn new(
        modem: impl peripheral::Peripheral<P = Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self> {
        let wifi = EspWifi::new(modem, sysloop, Some(nvs))?;
        Ok(Self {
            wifi,
            joining: false,
        })
    }
}

impl WifiLink for EspWifiLink {
    type Error = anyhow::Error;

    fn reset(&mut self) -> Result<()> {
        if self.wifi.is_started()? {
            // Not associated yet is fine here.
            let _ = self.wifi.disconnect();
            self.wifi.stop()?;
        }
        FreeRtos::delay_ms(RESET_SETTLE_MS);

        esp!(unsafe { esp_wifi_restore() })?;
        self.joining = false;

        // Station mode; tx power and power save can only be set once started.
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        self.wifi.start()?;
        debug!("Radio reset to station defaults");
        Ok(())
    }

    fn configure_radio(&mut self, tx_power_quarter_dbm: i8, power_save: bool) -> Result<()> {
        esp!(unsafe { esp_wifi_set_max_tx_power(tx_power_quarter_dbm) })?;

        let mode = if power_save {
            wifi_ps_type_t_WIFI_PS_MIN_MODEM
        } else {
            wifi_ps_type_t_WIFI_PS_NONE
        };
        esp!(unsafe { esp_wifi_set_ps(mode) })?;

        info!(
            "Radio: tx power {} dBm, power save {}",
            f32::from(tx_power_quarter_dbm) / 4.0,
            if power_save { "on" } else { "off" }
        );
        Ok(())
    }

    fn begin(&mut self, ssid: &str, password: &str) -> Result<()> {
        let auth_method = if password.is_empty() {
            info!("WiFi password is empty, using open network");
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        self.wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| anyhow!("SSID too long (max 32 chars)"))?,
            password: password
                .try_into()
                .map_err(|_| anyhow!("Password too long (max 64 chars)"))?,
            auth_method,
            ..Default::default()
        }))?;

        self.wifi.connect()?;
        self.joining = true;
        Ok(())
    }

    fn status(&mut self) -> ConnectionState {
        let associated = self.wifi.is_connected().unwrap_or(false);
        let has_ip = self.wifi.sta_netif().is_up().unwrap_or(false);

        match (associated && has_ip, self.joining) {
            (true, _) => {
                // Any later loss reads as Disconnected, never as still joining.
                self.joining = false;
                ConnectionState::Connected
            }
            (false, true) => ConnectionState::Connecting,
            (false, false) => ConnectionState::Disconnected,
        }
    }

    fn network_info(&self) -> Option<NetworkInfo> {
        let ip_info = self.wifi.sta_netif().get_ip_info().ok()?;
        Some(NetworkInfo {
            ip: ip_info.ip,
            gateway: ip_info.subnet.gateway,
            netmask: prefix_to_netmask(ip_info.subnet.mask.0),
        })
    }
}

/// `/24` -> `255.255.255.0`.
fn prefix_to_netmask(prefix: u8) -> Ipv4Addr {
    let bits = u32::MAX
        .checked_shl(32 - u32::from(prefix.min(32)))
        .unwrap_or(0);
    Ipv4Addr::from(bits)
}
