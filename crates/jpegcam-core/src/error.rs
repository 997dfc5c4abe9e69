//! Error taxonomy for the capture-and-serve pipeline.
//!
//! Two classes exist:
//! - [`Fatal`]: the device has no defined useful state left and must restart.
//!   Returned up to the top-level driver, which is the only place that resets.
//! - Recoverable errors ([`CaptureError`], [`HttpError`]): reported to the
//!   requesting client or logged, after which the loop carries on.
//!
//! A client vanishing mid-transfer is not an error at all; see
//! [`TransferStatus`](crate::transport::TransferStatus).

use std::time::Duration;
use thiserror::Error;

/// Conditions that end the current boot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fatal {
    /// The camera driver rejected its configuration.
    #[error("Camera init failed with error 0x{code:x}")]
    HardwareInit { code: i32 },

    /// No association was achieved during boot.
    #[error("WiFi association not established within {}ms", elapsed.as_millis())]
    WifiTimeout { elapsed: Duration },

    /// Association dropped after a successful connect.
    #[error("WiFi association lost")]
    WifiLost,
}

impl Fatal {
    /// Short reason string suitable for a restart log line.
    pub fn reason(&self) -> &'static str {
        match self {
            Fatal::HardwareInit { .. } => "camera init failure",
            Fatal::WifiTimeout { .. } => "wifi connect timeout",
            Fatal::WifiLost => "wifi lost",
        }
    }
}

/// The driver could not deliver a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Camera capture failed")]
pub struct CaptureError;

/// Problems reading an inbound request.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Socket error while reading the request head.
    #[error("I/O error reading request: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed before a full request line arrived.
    #[error("Connection closed before request line")]
    ConnectionClosed,

    /// No line break within the request-line limit.
    #[error("Request line longer than {limit} bytes")]
    RequestLineTooLong { limit: usize },

    /// Request line was not `METHOD TARGET HTTP/x.y`.
    #[error("Malformed request line")]
    MalformedRequestLine,
}
