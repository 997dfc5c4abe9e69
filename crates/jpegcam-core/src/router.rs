//! Request dispatch.
//!
//! Two routes carry meaning:
//!
//! | Method | Path   | Response                                   |
//! |--------|--------|--------------------------------------------|
//! | GET    | `/`    | 200 `text/html` viewer page                |
//! | GET    | `/jpg` | 200 `image/jpeg`, or 500 on capture failure |
//!
//! Anything else gets a 404.

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::frame::{CameraDriver, FrameSource};
use crate::http::{BodyError, Method, Request, Responder, ResponseHead, Status};
use crate::page::viewer_page;
use crate::transport::{StreamTransport, TransferStatus};

pub const VIEWER_PATH: &str = "/";
pub const FRAME_PATH: &str = "/jpg";

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Viewer,
    Frame,
    NotFound,
}

impl Route {
    pub fn resolve(request: &Request) -> Self {
        match (&request.method, request.path.as_str()) {
            (Method::Get, VIEWER_PATH) => Route::Viewer,
            (Method::Get, FRAME_PATH) => Route::Frame,
            _ => Route::NotFound,
        }
    }
}

/// What a served connection ended as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    PageServed,
    FrameSent(TransferStatus),
    CaptureFailed,
    NotFound,
    /// The request never made it to a route and was dropped unanswered.
    BadRequest,
}

/// Maps requests to handlers.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    page: String,
    transport: StreamTransport,
}

impl RequestRouter {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            page: viewer_page(config.refresh_interval_ms),
            transport: StreamTransport::new(config.chunk_size),
        }
    }

    /// Answer `request` through `responder`.
    ///
    /// Only a failure to start the response is returned as an error, and by
    /// then any acquired frame has already been released. A client that
    /// leaves during the body shows up in the outcome instead.
    pub fn dispatch<R, D, C>(
        &self,
        request: &Request,
        responder: R,
        frames: &mut FrameSource<D>,
        clock: &C,
    ) -> Result<Outcome, BodyError<R>>
    where
        R: Responder,
        D: CameraDriver,
        C: Clock + ?Sized,
    {
        match Route::resolve(request) {
            Route::Viewer => {
                let head = ResponseHead::new(Status::Ok, "text/html", self.page.len());
                let mut body = responder.start(&head)?;
                self.transport.send(&mut body, self.page.as_bytes(), clock);
                Ok(Outcome::PageServed)
            }
            Route::Frame => self.send_frame(responder, frames, clock),
            Route::NotFound => {
                debug!(method = %request.method, path = %request.path, "No route");
                let text = format!("Not found: {}", request.path);
                self.send_text(responder, Status::NotFound, &text, clock)?;
                Ok(Outcome::NotFound)
            }
        }
    }

    fn send_frame<R, D, C>(
        &self,
        responder: R,
        frames: &mut FrameSource<D>,
        clock: &C,
    ) -> Result<Outcome, BodyError<R>>
    where
        R: Responder,
        D: CameraDriver,
        C: Clock + ?Sized,
    {
        let frame = match frames.acquire_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{}", e);
                let text = e.to_string();
                self.send_text(responder, Status::InternalServerError, &text, clock)?;
                return Ok(Outcome::CaptureFailed);
            }
        };

        let head = ResponseHead::new(Status::Ok, "image/jpeg", frame.len());
        let mut body = match responder.start(&head) {
            Ok(body) => body,
            Err(e) => {
                frame.release();
                return Err(e);
            }
        };
        let status = self.transport.send(&mut body, &frame, clock);
        frame.release();

        Ok(Outcome::FrameSent(status))
    }

    fn send_text<R, C>(
        &self,
        responder: R,
        status: Status,
        text: &str,
        clock: &C,
    ) -> Result<TransferStatus, BodyError<R>>
    where
        R: Responder,
        C: Clock + ?Sized,
    {
        let head = ResponseHead::new(status, "text/plain", text.len());
        let mut body = responder.start(&head)?;
        Ok(self.transport.send(&mut body, text.as_bytes(), clock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;
    use crate::net::StdStream;
    use crate::testing::{jpeg_of_len, FakeCamera, ManualClock, ScriptedClient};
    use pretty_assertions::assert_eq;

    fn request(line: &str) -> Request {
        Request::parse_line(line.as_bytes()).unwrap()
    }

    fn source(camera: FakeCamera) -> FrameSource<FakeCamera> {
        FrameSource::initialize(camera, &CameraConfig::default()).unwrap()
    }

    fn dispatch(
        line: &str,
        client: &mut ScriptedClient,
        frames: &mut FrameSource<FakeCamera>,
    ) -> Outcome {
        let router = RequestRouter::new(&ServerConfig::default());
        router
            .dispatch(&request(line), StdStream(client), frames, &ManualClock::new())
            .unwrap()
    }

    #[test]
    fn test_route_resolution() {
        assert_eq!(Route::resolve(&request("GET / HTTP/1.1")), Route::Viewer);
        assert_eq!(Route::resolve(&request("GET /jpg HTTP/1.1")), Route::Frame);
        assert_eq!(Route::resolve(&request("GET /jpg?t=123 HTTP/1.1")), Route::Frame);
        assert_eq!(Route::resolve(&request("GET /stream HTTP/1.1")), Route::NotFound);
        assert_eq!(Route::resolve(&request("POST /jpg HTTP/1.1")), Route::NotFound);
        assert_eq!(Route::resolve(&request("HEAD / HTTP/1.1")), Route::NotFound);
    }

    #[test]
    fn test_viewer_page_response() {
        let mut frames = source(FakeCamera::with_frame(10));
        let ledger = frames.driver().ledger();
        let mut client = ScriptedClient::new();

        let outcome = dispatch("GET / HTTP/1.1", &mut client, &mut frames);

        assert_eq!(outcome, Outcome::PageServed);
        assert!(client.head().starts_with("HTTP/1.1 200 OK"));
        assert!(client.head().contains("Content-Type: text/html"));
        assert_eq!(client.body(), viewer_page(500).as_bytes());
        assert_eq!(ledger.acquired.get(), 0);
    }

    #[test]
    fn test_frame_response_announces_exact_length() {
        let mut frames = source(FakeCamera::with_frame(5000));
        let ledger = frames.driver().ledger();
        let mut client = ScriptedClient::new();

        let outcome = dispatch("GET /jpg?t=1 HTTP/1.1", &mut client, &mut frames);

        assert_eq!(
            outcome,
            Outcome::FrameSent(TransferStatus::Completed { bytes: 5000 })
        );
        let head = client.head();
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains("Content-Type: image/jpeg"));
        assert!(head.contains("Content-Length: 5000\r\n"));
        assert_eq!(client.body(), &jpeg_of_len(5000)[..]);
        assert_eq!(ledger.acquired.get(), 1);
        assert_eq!(ledger.released.get(), 1);
    }

    #[test]
    fn test_frame_body_goes_out_in_chunks() {
        let mut frames = source(FakeCamera::with_frame(2500));
        let mut client = ScriptedClient::new();

        dispatch("GET /jpg HTTP/1.1", &mut client, &mut frames);

        let head_len = ResponseHead::new(Status::Ok, "image/jpeg", 2500)
            .to_string()
            .len();
        assert_eq!(client.write_sizes, vec![head_len, 1024, 1024, 452]);
    }

    #[test]
    fn test_capture_failure_is_500() {
        let mut frames = source(FakeCamera::new(vec![None]));
        let ledger = frames.driver().ledger();
        let mut client = ScriptedClient::new();

        let outcome = dispatch("GET /jpg HTTP/1.1", &mut client, &mut frames);

        assert_eq!(outcome, Outcome::CaptureFailed);
        assert!(client.head().starts_with("HTTP/1.1 500 Internal Server Error"));
        assert!(client.head().contains("Content-Type: text/plain"));
        assert_eq!(client.body(), b"Camera capture failed");
        assert_eq!(ledger.acquired.get(), 0);
        assert_eq!(ledger.released.get(), 0);
    }

    #[test]
    fn test_disconnect_mid_frame_still_releases() {
        let mut frames = source(FakeCamera::with_frame(2000));
        let ledger = frames.driver().ledger();
        let head_len = ResponseHead::new(Status::Ok, "image/jpeg", 2000)
            .to_string()
            .len();
        let mut client = ScriptedClient::new().budget(head_len + 1024);

        let outcome = dispatch("GET /jpg HTTP/1.1", &mut client, &mut frames);

        assert_eq!(
            outcome,
            Outcome::FrameSent(TransferStatus::Aborted { bytes_sent: 1024 })
        );
        assert_eq!(ledger.acquired.get(), 1);
        assert_eq!(ledger.released.get(), 1);
    }

    #[test]
    fn test_head_write_failure_still_releases() {
        let mut frames = source(FakeCamera::with_frame(2000));
        let ledger = frames.driver().ledger();
        let mut client = ScriptedClient::new().budget(0);
        let router = RequestRouter::new(&ServerConfig::default());
        let req = request("GET /jpg HTTP/1.1");

        let clock = ManualClock::new();

        let result = router.dispatch(&req, StdStream(&mut client), &mut frames, &clock);

        assert!(result.is_err());
        assert_eq!(ledger.acquired.get(), 1);
        assert_eq!(ledger.released.get(), 1);
        assert!(frames.acquire_frame().is_ok());
    }

    #[test]
    fn test_unknown_path_is_404() {
        let mut frames = source(FakeCamera::with_frame(10));
        let mut client = ScriptedClient::new();

        let outcome = dispatch("GET /favicon.ico HTTP/1.1", &mut client, &mut frames);

        assert_eq!(outcome, Outcome::NotFound);
        assert!(client.head().starts_with("HTTP/1.1 404 Not Found"));
        assert_eq!(client.body(), b"Not found: /favicon.ico");
    }
}
