//! Simulated WiFi link.

use std::net::Ipv4Addr;

use jpegcam_core::{ConnectionState, NetworkInfo, WifiLink};
use tracing::{debug, warn};

/// Status polls answered with `Connecting` before the link comes up.
const DEFAULT_JOIN_POLLS: u32 = 3;

/// Loopback "network" that joins after a few polls and can be told to drop
/// after a number of connected polls.
#[derive(Debug)]
pub struct SimulatedLink {
    join_polls: u32,
    drop_after: Option<u64>,
    joining: bool,
    polls: u32,
    connected_polls: u64,
}

impl SimulatedLink {
    pub fn new(drop_after: Option<u64>) -> Self {
        Self {
            join_polls: DEFAULT_JOIN_POLLS,
            drop_after,
            joining: false,
            polls: 0,
            connected_polls: 0,
        }
    }

    pub fn with_join_polls(mut self, polls: u32) -> Self {
        self.join_polls = polls;
        self
    }
}

impl WifiLink for SimulatedLink {
    type Error = std::convert::Infallible;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.joining = false;
        self.polls = 0;
        self.connected_polls = 0;
        Ok(())
    }

    fn configure_radio(
        &mut self,
        tx_power_quarter_dbm: i8,
        power_save: bool,
    ) -> Result<(), Self::Error> {
        debug!(tx_power_quarter_dbm, power_save, "Simulated radio configured");
        Ok(())
    }

    fn begin(&mut self, ssid: &str, _password: &str) -> Result<(), Self::Error> {
        debug!(ssid, "Simulated join started");
        self.joining = true;
        Ok(())
    }

    fn status(&mut self) -> ConnectionState {
        if !self.joining {
            return ConnectionState::Disconnected;
        }
        if self.polls < self.join_polls {
            self.polls += 1;
            return ConnectionState::Connecting;
        }

        if let Some(limit) = self.drop_after {
            if self.connected_polls >= limit {
                warn!("Simulated link dropped after {} polls", limit);
                self.joining = false;
                return ConnectionState::Disconnected;
            }
        }
        self.connected_polls += 1;
        ConnectionState::Connected
    }

    fn network_info(&self) -> Option<NetworkInfo> {
        Some(NetworkInfo {
            ip: Ipv4Addr::LOCALHOST,
            gateway: Ipv4Addr::LOCALHOST,
            netmask: Ipv4Addr::new(255, 0, 0, 0),
        })
    }
}
