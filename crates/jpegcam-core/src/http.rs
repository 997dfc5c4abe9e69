//! HTTP request lines, response heads and the seam to the server in front.
//!
//! On the device `EspHttpServer` owns the sockets and hands each request to
//! the router; on Linux the [`PollingServer`](crate::net::PollingServer)
//! reads the request line itself. Either way the router only sees a
//! [`Request`] and a [`Responder`].

use std::fmt;
use std::io::{self, Read};

use embedded_svc::io::{ErrorType, Write};

use crate::error::HttpError;

/// Longest request line accepted. Header lines are read and discarded
/// without a limit.
pub const MAX_REQUEST_LINE: usize = 2048;

const READ_CHUNK: usize = 512;

/// Request method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Other(String),
}

impl Method {
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Head => f.write_str("HEAD"),
            Method::Post => f.write_str("POST"),
            Method::Put => f.write_str("PUT"),
            Method::Delete => f.write_str("DELETE"),
            Method::Other(m) => f.write_str(m),
        }
    }
}

/// What the router needs to know about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    pub query: Option<String>,
}

impl Request {
    /// Build from a method and a request target such as `/jpg?t=17`.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_string(),
            query,
        }
    }

    /// Parse a request line, with or without its trailing CRLF.
    pub fn parse_line(line: &[u8]) -> Result<Self, HttpError> {
        let mut line = line.to_vec();
        if !line.ends_with(b"\n") {
            line.extend_from_slice(b"\r\n");
        }

        // No header slots: parsing stops right after the request line, which
        // httparse reports as a partial request with method and path filled.
        let mut no_headers: [httparse::Header<'_>; 0] = [];
        let mut parsed = httparse::Request::new(&mut no_headers);
        parsed
            .parse(&line)
            .map_err(|_| HttpError::MalformedRequestLine)?;

        match (parsed.method, parsed.path) {
            (Some(method), Some(target)) => Ok(Self::new(Method::parse(method), target)),
            _ => Err(HttpError::MalformedRequestLine),
        }
    }

    /// Read one request from `stream`.
    ///
    /// The request line is parsed as soon as its line break arrives. The
    /// header lines after it are drained up to the blank line so the peer
    /// sees an orderly close, but they are never buffered, so a browser
    /// sending kilobytes of cookies is served like any other. A body, if
    /// any, is left unread since no route accepts one.
    pub fn read_from<R: Read + ?Sized>(stream: &mut R) -> Result<Self, HttpError> {
        let mut chunk = [0u8; READ_CHUNK];
        let mut line = Vec::with_capacity(128);

        let line_end = loop {
            let n = read_some(stream, &mut chunk)?;
            if n == 0 {
                return Err(HttpError::ConnectionClosed);
            }
            line.extend_from_slice(&chunk[..n]);
            if let Some(at) = line.iter().position(|&b| b == b'\n') {
                break at;
            }
            if line.len() > MAX_REQUEST_LINE {
                return Err(HttpError::RequestLineTooLong {
                    limit: MAX_REQUEST_LINE,
                });
            }
        };
        if line_end > MAX_REQUEST_LINE {
            return Err(HttpError::RequestLineTooLong {
                limit: MAX_REQUEST_LINE,
            });
        }

        let request = Self::parse_line(&line[..=line_end])?;

        let mut terminator = HeadEnd::after_line();
        if !terminator.feed(&line[line_end + 1..]) {
            loop {
                let n = read_some(stream, &mut chunk)?;
                // A peer that half-closes after the request line is still served.
                if n == 0 || terminator.feed(&chunk[..n]) {
                    break;
                }
            }
        }

        Ok(request)
    }
}

fn read_some<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> Result<usize, HttpError> {
    loop {
        match stream.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HttpError::Io(e)),
        }
    }
}

/// Finds the blank line ending a request head across read boundaries.
struct HeadEnd {
    matched: usize,
}

impl HeadEnd {
    /// The request line's own CRLF counts as the first half of the terminator.
    fn after_line() -> Self {
        Self { matched: 2 }
    }

    fn feed(&mut self, bytes: &[u8]) -> bool {
        for &b in bytes {
            self.matched = match (self.matched, b) {
                (0 | 2, b'\r') => self.matched + 1,
                (1 | 3, b'\n') => self.matched + 1,
                (_, b'\r') => 1,
                _ => 0,
            };
            if self.matched == 4 {
                return true;
            }
        }
        false
    }
}

/// Status codes the device answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    InternalServerError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

/// Status plus the few headers every response carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: Status,
    pub content_type: &'static str,
    pub content_length: usize,
}

impl ResponseHead {
    pub fn new(status: Status, content_type: &'static str, content_length: usize) -> Self {
        Self {
            status,
            content_type,
            content_length,
        }
    }

    /// Header fields in wire order. `content_length` is the formatted length,
    /// kept by the caller so the borrowed pairs outlive this call.
    pub fn headers<'a>(&'a self, content_length: &'a str) -> [(&'a str, &'a str); 4] {
        [
            ("Content-Type", self.content_type),
            ("Content-Length", content_length),
            ("Cache-Control", "no-store"),
            ("Connection", "close"),
        ]
    }
}

/// Status line, headers and the blank line, as sent on a raw socket.
impl fmt::Display for ResponseHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let length = self.content_length.to_string();
        write!(f, "HTTP/1.1 {} {}\r\n", self.status.code(), self.status.reason())?;
        for (name, value) in self.headers(&length) {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        f.write_str("\r\n")
    }
}

/// Starts the response on whatever connection a request arrived on.
pub trait Responder {
    /// Receives the body once the head is out.
    type Body: Write;

    fn start(self, head: &ResponseHead) -> Result<Self::Body, <Self::Body as ErrorType>::Error>;
}

/// Error type of a responder's body writer.
pub type BodyError<R> = <<R as Responder>::Body as ErrorType>::Error;
