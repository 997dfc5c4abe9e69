//! HTTP front end on the ESP-IDF server.
//!
//! `EspHttpServer` owns the sockets and runs handlers on its own task, one
//! request at a time. A wildcard handler per method passes every request to
//! the core `RequestRouter`, so routes, 404 bodies and the chunked frame
//! transfer are the same code the Linux simulator runs. What became of each
//! request is reported to the supervisor loop over a channel; WiFi checks and
//! the restart decision stay with the loop.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use embedded_svc::http::server::{Connection, Request, Response};
use embedded_svc::http::{Method as HttpMethod, Query};
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::io::EspIOError;
use jpegcam_core::http::BodyError;
use jpegcam_core::{
    CameraDriver, Clock, FrameSource, Method, Outcome, RequestRouter, RequestService, Responder,
    ResponseHead, ServerConfig,
};
use log::{debug, info};

/// Handler task stack. The router formats its bodies there.
const HANDLER_STACK_SIZE: usize = 10240;

/// Methods routed to the core. Anything the router does not know gets its 404.
const ROUTED_METHODS: [HttpMethod; 5] = [
    HttpMethod::Get,
    HttpMethod::Head,
    HttpMethod::Post,
    HttpMethod::Put,
    HttpMethod::Delete,
];

/// Starts a response on an ESP-IDF server connection.
pub struct HttpResponder<C>(pub Request<C>);

impl<C: Connection> Responder for HttpResponder<C> {
    type Body = Response<C>;

    fn start(self, head: &ResponseHead) -> Result<Response<C>, BodyError<Self>> {
        let length = head.content_length.to_string();
        self.0.into_response(
            head.status.code(),
            Some(head.status.reason()),
            &head.headers(&length),
        )
    }
}

/// The running server plus the outcomes it reports.
pub struct CameraServer {
    _server: EspHttpServer<'static>,
    outcomes: Receiver<Outcome>,
}

impl CameraServer {
    /// Take over the camera and start serving on `config.port`.
    pub fn start<D, K>(frames: FrameSource<D>, config: &ServerConfig, clock: K) -> Result<Self>
    where
        D: CameraDriver + Send + 'static,
        K: Clock + Clone + Send + 'static,
    {
        let mut server = EspHttpServer::new(&Configuration {
            http_port: config.port,
            uri_match_wildcard: true,
            stack_size: HANDLER_STACK_SIZE,
            ..Default::default()
        })?;

        let router = RequestRouter::new(config);
        let frames = Arc::new(Mutex::new(frames));
        let (tx, outcomes) = mpsc::channel();

        for method in ROUTED_METHODS {
            let router = router.clone();
            let frames = frames.clone();
            let clock = clock.clone();
            let tx = tx.clone();
            server.fn_handler("/*", method, move |req| -> Result<(), EspIOError> {
                serve(req, &router, &frames, &clock, &tx)
            })?;
        }

        info!("HTTP server listening on port {}", config.port);
        Ok(Self {
            _server: server,
            outcomes,
        })
    }
}

impl RequestService for CameraServer {
    fn poll(&mut self) -> Option<Outcome> {
        self.outcomes.poll()
    }
}

fn serve<C, D, K>(
    req: Request<C>,
    router: &RequestRouter,
    frames: &Mutex<FrameSource<D>>,
    clock: &K,
    outcomes: &Sender<Outcome>,
) -> Result<(), C::Error>
where
    C: Connection,
    D: CameraDriver,
    K: Clock,
{
    let request = jpegcam_core::Request::new(method(req.method()), req.uri());
    debug!("{} {}", request.method, request.path);

    // The source keeps no partial state across a panicked handler.
    let mut frames = frames.lock().unwrap_or_else(PoisonError::into_inner);
    let outcome = router.dispatch(&request, HttpResponder(req), &mut *frames, clock)?;

    // Fails only once the supervisor is gone and the chip is restarting.
    let _ = outcomes.send(outcome);
    Ok(())
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::Get,
        HttpMethod::Head => Method::Head,
        HttpMethod::Post => Method::Post,
        HttpMethod::Put => Method::Put,
        HttpMethod::Delete => Method::Delete,
        other => Method::Other(format!("{:?}", other).to_uppercase()),
    }
}
