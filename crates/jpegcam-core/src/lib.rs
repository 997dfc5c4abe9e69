//! # jpegcam-core
//!
//! Capture-and-serve pipeline for a single-buffer JPEG camera.
//!
//! This crate provides:
//! - WiFi association supervision (`ConnectivityManager`)
//! - Guarded access to the camera's one frame buffer (`FrameSource`, `Frame`)
//! - Chunked delivery to a client under backpressure (`StreamTransport`)
//! - Request routing behind the `Responder` seam (`RequestRouter`)
//! - The cooperative top-level loop (`SupervisorLoop`) and a polling
//!   `std::net` server for hosts without an HTTP server of their own
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! Hardware is reached through the `WifiLink` and `CameraDriver` traits, which
//! are implemented for ESP-IDF in `jpegcam-esp32` and simulated on Linux in
//! `jpegcam-host`.

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod frame;
pub mod http;
pub mod net;
pub mod page;
pub mod router;
pub mod service;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod testing;

pub use clock::{Clock, StdClock};
pub use config::{CameraConfig, CameraPins, DeviceConfig, FrameSize, ServerConfig, WifiConfig};
pub use connectivity::{ConnectionState, ConnectivityManager, NetworkInfo, WifiLink};
pub use error::{CaptureError, Fatal};
pub use frame::{CameraDriver, Frame, FrameSource};
pub use http::{Method, Request, Responder, ResponseHead, Status};
pub use net::{Acceptor, PollingServer, SocketError, StdStream, TcpAcceptor};
pub use router::{Outcome, RequestRouter, Route};
pub use service::RequestService;
pub use supervisor::{boot, Booted, LoopState, LoopStats, SupervisorLoop};
pub use transport::{StreamTransport, TransferStatus};
