//! Single-buffer frame acquisition.
//!
//! The camera driver owns exactly one hardware frame buffer. [`FrameSource`]
//! hands it out as a [`Frame`] guard that mutably borrows the source, so:
//! - a second acquire while a frame is outstanding does not compile
//! - the buffer goes back to the driver when the guard is dropped, on every
//!   exit path including early returns and `?`
//!
//! A frame that is never released would starve every later capture, since the
//! driver has no second buffer to fall back on.

use std::ops::Deref;

use tracing::{debug, trace, warn};

use crate::config::CameraConfig;
use crate::error::{CaptureError, Fatal};

/// Driver code reported for configurations rejected before reaching the
/// hardware. Same value as ESP-IDF's `ESP_ERR_INVALID_ARG`.
pub const ERR_INVALID_ARG: i32 = 0x102;

/// Narrow interface onto the vendor camera driver.
pub trait CameraDriver {
    /// Token identifying the driver's frame buffer while it is lent out.
    type Handle;

    /// Configure pins, clock, pixel format, resolution and buffer count.
    /// Returns the driver's error code on failure.
    fn init(&mut self, config: &CameraConfig) -> Result<(), i32>;

    /// Block until a frame is ready. `None` if capture failed.
    fn capture(&mut self) -> Option<Self::Handle>;

    /// JPEG bytes behind a handle obtained from [`capture`](Self::capture).
    fn data<'a>(&'a self, handle: &'a Self::Handle) -> &'a [u8];

    /// Give the buffer back to the driver.
    fn release(&mut self, handle: Self::Handle);
}

/// Counters kept across the lifetime of a [`FrameSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub acquired: u64,
    pub released: u64,
    pub capture_failures: u64,
}

/// Owner of the initialized imaging hardware.
///
/// Only obtainable through [`FrameSource::initialize`], so holding one means
/// the driver accepted its configuration.
pub struct FrameSource<D> {
    driver: D,
    stats: FrameStats,
}

impl<D: CameraDriver> FrameSource<D> {
    /// Initialize the camera once. Any failure is fatal since the driver's
    /// state after a rejected init cannot be trusted.
    pub fn initialize(mut driver: D, config: &CameraConfig) -> Result<Self, Fatal> {
        if let Err(e) = config.validate() {
            warn!("Rejecting camera configuration: {}", e);
            return Err(Fatal::HardwareInit {
                code: ERR_INVALID_ARG,
            });
        }

        driver.init(config).map_err(|code| Fatal::HardwareInit { code })?;

        let (width, height) = config.frame_size.dimensions();
        debug!(
            width,
            height,
            quality = config.jpeg_quality,
            xclk_hz = config.xclk_freq_hz,
            "Camera initialized"
        );

        Ok(Self {
            driver,
            stats: FrameStats::default(),
        })
    }

    /// Wait for the next frame.
    pub fn acquire_frame(&mut self) -> Result<Frame<'_, D>, CaptureError> {
        match self.driver.capture() {
            Some(handle) => {
                self.stats.acquired += 1;
                trace!("Frame acquired");
                Ok(Frame {
                    source: self,
                    handle: Some(handle),
                })
            }
            None => {
                self.stats.capture_failures += 1;
                Err(CaptureError)
            }
        }
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn release_handle(&mut self, handle: D::Handle) {
        self.driver.release(handle);
        self.stats.released += 1;
        trace!("Frame released");
    }
}

/// A captured JPEG image, borrowed from the driver.
///
/// Dereferences to the encoded bytes. Dropping it returns the buffer.
pub struct Frame<'a, D: CameraDriver> {
    source: &'a mut FrameSource<D>,
    // Only `None` while being dropped.
    handle: Option<D::Handle>,
}

impl<D: CameraDriver> Frame<'_, D> {
    /// Return the buffer now rather than at end of scope.
    pub fn release(self) {}
}

impl<D: CameraDriver> Deref for Frame<'_, D> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.handle {
            Some(handle) => self.source.driver.data(handle),
            None => &[],
        }
    }
}

impl<D: CameraDriver> Drop for Frame<'_, D> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.source.release_handle(handle);
        }
    }
}

impl<D: CameraDriver> std::fmt::Debug for Frame<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("len", &self.len()).finish()
    }
}
