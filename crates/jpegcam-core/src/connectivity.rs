//! WiFi association management.
//!
//! [`ConnectivityManager`] owns the "is the network available" state. It joins
//! the configured network once at boot and afterwards only observes: any loss
//! of association is reported as [`Fatal::WifiLost`] and never repaired in
//! place.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::WifiConfig;
use crate::error::Fatal;

/// Association state as seen by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not associated with any network.
    Disconnected,
    /// Association started but not yet confirmed.
    Connecting,
    /// Associated and holding an address.
    Connected,
}

/// Addressing handed out by the network after association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

/// Narrow interface onto the radio driver.
///
/// Implementations wrap the vendor stack (`EspWifi` on ESP32, a simulation on
/// Linux). None of the calls block for long; waiting is done by the manager.
pub trait WifiLink {
    type Error: fmt::Display;

    /// Drop any prior association and stored radio settings, then enter
    /// station mode.
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Apply transmit power (0.25 dBm units) and modem power-save mode.
    fn configure_radio(
        &mut self,
        tx_power_quarter_dbm: i8,
        power_save: bool,
    ) -> Result<(), Self::Error>;

    /// Start associating. Returns once the request is issued.
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Current association state. Must not block.
    fn status(&mut self) -> ConnectionState;

    /// Addressing, once connected.
    fn network_info(&self) -> Option<NetworkInfo>;
}

/// Brings the device onto the network and keeps watching it.
pub struct ConnectivityManager<L, C> {
    link: L,
    clock: C,
    config: WifiConfig,
    state: ConnectionState,
}

impl<L: WifiLink, C: Clock> ConnectivityManager<L, C> {
    pub fn new(link: L, clock: C, config: WifiConfig) -> Self {
        Self {
            link,
            clock,
            config,
            state: ConnectionState::Disconnected,
        }
    }

    /// Last observed association state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Join the configured network, polling every `poll_interval` until
    /// connected or `timeout` has elapsed.
    ///
    /// Radio setup failures are logged and the join is attempted anyway; a
    /// link that never comes up ends in [`Fatal::WifiTimeout`], which is
    /// returned no later than `timeout` plus one poll interval after the
    /// join started.
    pub fn connect(&mut self, timeout: Duration) -> Result<NetworkInfo, Fatal> {
        if let Err(e) = self.link.reset() {
            warn!("Failed to reset radio: {}", e);
        }
        if let Err(e) = self
            .link
            .configure_radio(self.config.tx_power_quarter_dbm, self.config.power_save)
        {
            warn!("Failed to apply radio settings: {}", e);
        }

        info!("Connecting to '{}'...", self.config.ssid);
        let started = self.clock.now();
        self.state = ConnectionState::Connecting;
        if let Err(e) = self.link.begin(&self.config.ssid, &self.config.password) {
            warn!("Failed to start association: {}", e);
        }

        let poll_interval = self.config.poll_interval();
        loop {
            if self.link.status() == ConnectionState::Connected {
                return self.on_connected();
            }

            let elapsed = self.clock.now().saturating_sub(started);
            if elapsed >= timeout {
                self.state = ConnectionState::Disconnected;
                warn!(elapsed_ms = elapsed.as_millis() as u64, "Failed to connect!");
                return Err(Fatal::WifiTimeout { elapsed });
            }

            debug!(elapsed_ms = elapsed.as_millis() as u64, "Waiting for association");
            self.clock.sleep(poll_interval);
        }
    }

    fn on_connected(&mut self) -> Result<NetworkInfo, Fatal> {
        self.state = ConnectionState::Connected;
        let info = self.link.network_info().unwrap_or(NetworkInfo {
            ip: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
        });
        info!("WiFi connected!");
        info!("  IP address: {}", info.ip);
        info!("  Gateway:    {}", info.gateway);
        info!("  Netmask:    {}", info.netmask);
        Ok(info)
    }

    /// Non-blocking query of the current association.
    pub fn is_connected(&mut self) -> bool {
        let status = self.link.status();
        if status != self.state {
            debug!(from = ?self.state, to = ?status, "Connection state changed");
        }
        self.state = status;
        status == ConnectionState::Connected
    }

    /// Re-derive health once per supervisor iteration.
    pub fn check(&mut self) -> Result<(), Fatal> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Fatal::WifiLost)
        }
    }
}
