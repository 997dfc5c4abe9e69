//! Socket-level serving for hosts that expose `std::net`.
//!
//! On the device the ESP-IDF HTTP server owns the sockets. The Linux
//! simulator has no such server, so [`PollingServer`] accepts and answers one
//! connection per supervisor tick on a non-blocking listener instead.

use std::fmt;
use std::io::{self, Read, Write as _};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use embedded_svc::io::{ErrorKind, ErrorType, Write};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::frame::{CameraDriver, FrameSource};
use crate::http::{Request, Responder, ResponseHead};
use crate::router::{Outcome, RequestRouter};
use crate::service::RequestService;

/// A client that connects but never finishes its request head is dropped after this.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of inbound client connections.
pub trait Acceptor {
    type Stream: Read + io::Write;

    /// Return a pending connection if one is waiting. Must not block.
    fn poll_accept(&mut self) -> io::Result<Option<Self::Stream>>;
}

/// Non-blocking `std::net` listener.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Listen on all interfaces.
    pub fn bind(port: u16) -> io::Result<Self> {
        Self::from_listener(TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?)
    }

    pub fn from_listener(listener: TcpListener) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        info!("HTTP server listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Acceptor for TcpAcceptor {
    type Stream = TcpStream;

    fn poll_accept(&mut self) -> io::Result<Option<TcpStream>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                debug!(%addr, "Client connected");
                // The transfer itself is blocking; backpressure shows up as
                // short writes rather than WouldBlock.
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                stream.set_read_timeout(Some(REQUEST_READ_TIMEOUT))?;
                Ok(Some(stream))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// `std::io` socket error seen through the `embedded-io` traits.
#[derive(Debug)]
pub struct SocketError(pub io::Error);

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for SocketError {}

impl embedded_svc::io::Error for SocketError {
    fn kind(&self) -> ErrorKind {
        match self.0.kind() {
            io::ErrorKind::Interrupted => ErrorKind::Interrupted,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::TimedOut,
            io::ErrorKind::ConnectionReset => ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted => ErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
            io::ErrorKind::NotConnected => ErrorKind::NotConnected,
            _ => ErrorKind::Other,
        }
    }
}

/// Raw `std::io` connection. As a [`Responder`] it writes the response head
/// itself, then hands itself out as the body writer.
#[derive(Debug)]
pub struct StdStream<S>(pub S);

impl<S> ErrorType for StdStream<S> {
    type Error = SocketError;
}

impl<S: io::Write> Write for StdStream<S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, SocketError> {
        self.0.write(buf).map_err(SocketError)
    }

    fn flush(&mut self) -> Result<(), SocketError> {
        self.0.flush().map_err(SocketError)
    }
}

impl<S: io::Write> Responder for StdStream<S> {
    type Body = Self;

    fn start(mut self, head: &ResponseHead) -> Result<Self, SocketError> {
        self.0
            .write_all(head.to_string().as_bytes())
            .map_err(SocketError)?;
        Ok(self)
    }
}

/// Answers at most one connection per [`poll`](RequestService::poll).
pub struct PollingServer<A, D, C> {
    acceptor: A,
    router: RequestRouter,
    frames: FrameSource<D>,
    clock: C,
}

impl<A, D, C> PollingServer<A, D, C>
where
    A: Acceptor,
    D: CameraDriver,
    C: Clock,
{
    pub fn new(acceptor: A, frames: FrameSource<D>, config: &ServerConfig, clock: C) -> Self {
        Self {
            acceptor,
            router: RequestRouter::new(config),
            frames,
            clock,
        }
    }

    pub fn frames(&self) -> &FrameSource<D> {
        &self.frames
    }

    fn serve(&mut self, mut stream: A::Stream) -> Option<Outcome> {
        let request = match Request::read_from(&mut stream) {
            Ok(request) => request,
            Err(e) => {
                debug!("Dropping connection: {}", e);
                return Some(Outcome::BadRequest);
            }
        };
        debug!(method = %request.method, path = %request.path, "Dispatching");

        let responder = StdStream(&mut stream);
        match self
            .router
            .dispatch(&request, responder, &mut self.frames, &self.clock)
        {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                debug!(path = %request.path, "Response aborted: {}", e);
                None
            }
        }
    }
}

impl<A, D, C> RequestService for PollingServer<A, D, C>
where
    A: Acceptor,
    D: CameraDriver,
    C: Clock,
{
    fn poll(&mut self) -> Option<Outcome> {
        match self.acceptor.poll_accept() {
            Ok(Some(stream)) => self.serve(stream),
            Ok(None) => None,
            Err(e) => {
                warn!("Accept failed: {}", e);
                None
            }
        }
    }
}
