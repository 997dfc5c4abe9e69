//! Boot sequence and the top-level cooperative loop.
//!
//! One [`SupervisorLoop::tick`] is one iteration:
//! 1. let the request service answer or report at most one request
//! 2. re-check the WiFi association
//! 3. sleep for the loop yield
//!
//! Fatal conditions are never acted on here. They are returned to the caller,
//! which performs the platform restart exactly once.

use std::time::Duration;

use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::config::{DeviceConfig, ServerConfig};
use crate::connectivity::{ConnectivityManager, NetworkInfo, WifiLink};
use crate::error::Fatal;
use crate::frame::{CameraDriver, FrameSource};
use crate::router::Outcome;
use crate::service::RequestService;
use crate::transport::TransferStatus;

/// Where a request is within an iteration. Every iteration starts and ends
/// in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Dispatching,
    PageServing,
    Streaming,
    NotFound,
}

impl Outcome {
    /// Last state the request reached before the loop went back to idle.
    pub fn state(&self) -> LoopState {
        match self {
            Outcome::PageServed => LoopState::PageServing,
            Outcome::FrameSent(_) | Outcome::CaptureFailed => LoopState::Streaming,
            Outcome::NotFound => LoopState::NotFound,
            Outcome::BadRequest => LoopState::Dispatching,
        }
    }
}

/// Per-boot counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    pub pages_served: u64,
    pub frames_completed: u64,
    pub frames_aborted: u64,
    pub capture_failures: u64,
    pub not_found: u64,
    pub bad_requests: u64,
}

/// Components that survived boot.
pub struct Booted<L, D, C> {
    pub connectivity: ConnectivityManager<L, C>,
    pub frames: FrameSource<D>,
    pub network: NetworkInfo,
}

/// Join the network, then bring up the camera.
///
/// Order matters: a device that cannot reach the network has nothing to
/// serve, so the camera is only touched once association succeeded.
pub fn boot<L, D, C>(
    config: &DeviceConfig,
    link: L,
    driver: D,
    clock: C,
) -> Result<Booted<L, D, C>, Fatal>
where
    L: WifiLink,
    D: CameraDriver,
    C: Clock,
{
    let mut connectivity = ConnectivityManager::new(link, clock, config.wifi.clone());
    let network = connectivity.connect(config.wifi.connect_timeout())?;

    let frames = FrameSource::initialize(driver, &config.camera)?;
    info!(
        "Camera ready: {:?} at JPEG quality {}",
        config.camera.frame_size, config.camera.jpeg_quality
    );

    Ok(Booted {
        connectivity,
        frames,
        network,
    })
}

/// The device's main loop.
pub struct SupervisorLoop<L, S, C> {
    connectivity: ConnectivityManager<L, C>,
    service: S,
    clock: C,
    loop_yield: Duration,
    stats: LoopStats,
}

impl<L, S, C> SupervisorLoop<L, S, C>
where
    L: WifiLink,
    S: RequestService,
    C: Clock,
{
    pub fn new(
        connectivity: ConnectivityManager<L, C>,
        service: S,
        config: &ServerConfig,
        clock: C,
    ) -> Self {
        Self {
            connectivity,
            service,
            clock,
            loop_yield: config.loop_yield(),
            stats: LoopStats::default(),
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn connectivity(&self) -> &ConnectivityManager<L, C> {
        &self.connectivity
    }

    /// Run one iteration. `Err` means the device must restart.
    pub fn tick(&mut self) -> Result<Option<Outcome>, Fatal> {
        self.stats.iterations += 1;

        let outcome = self.service.poll();
        if let Some(outcome) = outcome {
            debug!(state = ?outcome.state(), ?outcome, "Request finished");
            self.record(outcome);
        }

        self.connectivity.check()?;

        self.clock.sleep(self.loop_yield);
        Ok(outcome)
    }

    /// Tick until a fatal condition occurs and hand it back.
    ///
    /// Consumes the loop, so a restart can only ever be requested once per boot.
    pub fn run(mut self) -> Fatal {
        info!("Supervisor loop started");
        loop {
            if let Err(fatal) = self.tick() {
                error!(
                    iterations = self.stats.iterations,
                    "{} - restarting...", fatal
                );
                return fatal;
            }
        }
    }

    fn record(&mut self, outcome: Outcome) {
        let stats = &mut self.stats;
        match outcome {
            Outcome::PageServed => stats.pages_served += 1,
            Outcome::FrameSent(TransferStatus::Completed { .. }) => stats.frames_completed += 1,
            Outcome::FrameSent(TransferStatus::Aborted { .. }) => stats.frames_aborted += 1,
            Outcome::CaptureFailed => stats.capture_failures += 1,
            Outcome::NotFound => stats.not_found += 1,
            Outcome::BadRequest => stats.bad_requests += 1,
        }
    }
}
