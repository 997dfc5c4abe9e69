//! Chunked frame delivery to a single client.
//!
//! The network stack on the target has little internal buffering, so a frame
//! is written in bounded chunks with a cooperative yield between each. A
//! write that accepts zero bytes means the client is gone.

use embedded_svc::io::{Error, ErrorKind, Write};
use tracing::{debug, info};

use crate::clock::Clock;

/// Default largest single write.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// How a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Every byte was accepted.
    Completed { bytes: usize },
    /// The client stopped accepting data after `bytes_sent` bytes.
    Aborted { bytes_sent: usize },
}

impl TransferStatus {
    pub fn bytes_sent(&self) -> usize {
        match *self {
            TransferStatus::Completed { bytes } => bytes,
            TransferStatus::Aborted { bytes_sent } => bytes_sent,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TransferStatus::Completed { .. })
    }
}

/// Writes frame bytes in fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct StreamTransport {
    chunk_size: usize,
}

impl Default for StreamTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl StreamTransport {
    /// A zero chunk size is bumped to one byte.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Send `bytes` to `client`.
    ///
    /// The response head, including `Content-Length`, must already be written.
    /// The loop advances by what each write actually accepted and yields to
    /// `clock` between chunks. A vanished client is reported through the
    /// returned status and is not an error.
    pub fn send<W, C>(&self, client: &mut W, bytes: &[u8], clock: &C) -> TransferStatus
    where
        W: Write + ?Sized,
        C: Clock + ?Sized,
    {
        let total = bytes.len();
        let mut sent = 0;

        while sent < total {
            let end = total.min(sent + self.chunk_size);
            let chunk = &bytes[sent..end];

            let accepted = write_some(client, chunk);
            if accepted == 0 {
                info!(bytes_sent = sent, total, "Client disconnected during transfer");
                return TransferStatus::Aborted { bytes_sent: sent };
            }

            sent += accepted;
            clock.yield_now();
        }

        if let Err(e) = client.flush() {
            debug!("Flush after transfer failed: {:?}", e.kind());
        }
        debug!(bytes = total, "Frame sent");
        TransferStatus::Completed { bytes: total }
    }
}

/// One write, reporting accepted bytes. Errors other than `Interrupted` count
/// as nothing accepted.
fn write_some<W: Write + ?Sized>(client: &mut W, chunk: &[u8]) -> usize {
    loop {
        match client.write(chunk) {
            Ok(n) => return n.min(chunk.len()),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Write to client failed: {:?}", e);
                return 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::StdStream;
    use crate::testing::{jpeg_of_len, ManualClock, ScriptedClient};
    use embedded_svc::io::ErrorType;
    use pretty_assertions::assert_eq;

    fn send_to(client: &mut ScriptedClient, chunk: usize, frame: &[u8]) -> TransferStatus {
        StreamTransport::new(chunk).send(&mut StdStream(client), frame, &ManualClock::new())
    }

    #[test]
    fn test_full_frame_in_chunks() {
        let frame = jpeg_of_len(5000);
        let mut client = ScriptedClient::new();
        let clock = ManualClock::new();

        let status = StreamTransport::new(1024).send(&mut StdStream(&mut client), &frame, &clock);

        assert_eq!(status, TransferStatus::Completed { bytes: 5000 });
        assert_eq!(client.write_sizes, vec![1024, 1024, 1024, 1024, 904]);
        assert_eq!(client.output, frame);
        assert_eq!(clock.yields(), 5);
    }

    #[test]
    fn test_zero_write_aborts() {
        let frame = jpeg_of_len(2000);
        let mut client = ScriptedClient::new().budget(1024);

        let status = send_to(&mut client, 1024, &frame);

        assert_eq!(status, TransferStatus::Aborted { bytes_sent: 1024 });
        assert_eq!(client.write_sizes, vec![1024, 0]);
    }

    #[test]
    fn test_partial_writes_advance_by_accepted() {
        let frame = jpeg_of_len(2500);
        let mut client = ScriptedClient::new().max_per_write(700);

        let status = send_to(&mut client, 1024, &frame);

        assert_eq!(status, TransferStatus::Completed { bytes: 2500 });
        assert_eq!(client.write_sizes, vec![700, 700, 700, 400]);
        assert_eq!(client.output, frame);
    }

    #[test]
    fn test_empty_frame_completes_without_writes() {
        let mut client = ScriptedClient::new();

        let status = send_to(&mut client, 1024, &[]);

        assert_eq!(status, TransferStatus::Completed { bytes: 0 });
        assert!(client.write_sizes.is_empty());
    }

    #[test]
    fn test_zero_chunk_size_sends_bytewise() {
        let frame = jpeg_of_len(4);
        let mut client = ScriptedClient::new();

        let status = send_to(&mut client, 0, &frame);

        assert_eq!(status, TransferStatus::Completed { bytes: 4 });
        assert_eq!(client.write_sizes, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_bytes_sent_never_exceeds_length() {
        for len in [0usize, 1, 1023, 1024, 1025, 4096, 7777] {
            for chunk in [1usize, 7, 512, 1024, 5000] {
                for budget in [None, Some(0), Some(len / 2), Some(len)] {
                    let frame = jpeg_of_len(len);
                    let mut client = match budget {
                        Some(b) => ScriptedClient::new().budget(b),
                        None => ScriptedClient::new(),
                    };

                    let status = send_to(&mut client, chunk, &frame);

                    assert!(status.bytes_sent() <= len);
                    assert_eq!(status.bytes_sent(), client.output.len());
                    if status.is_completed() {
                        assert_eq!(status.bytes_sent(), len);
                    }
                }
            }
        }
    }

    /// Claims to have written more than it was given.
    struct Overreporting;

    impl ErrorType for Overreporting {
        type Error = ErrorKind;
    }

    impl Write for Overreporting {
        fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
            Ok(buf.len() * 2)
        }

        fn flush(&mut self) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    #[test]
    fn test_overreporting_writer_is_clamped() {
        let frame = jpeg_of_len(3000);

        let status =
            StreamTransport::new(1024).send(&mut Overreporting, &frame, &ManualClock::new());

        assert_eq!(status, TransferStatus::Completed { bytes: 3000 });
    }

    /// Interrupted on the second write, then reset for good.
    struct ResetAfterOne {
        writes: usize,
    }

    impl ErrorType for ResetAfterOne {
        type Error = ErrorKind;
    }

    impl Write for ResetAfterOne {
        fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
            self.writes += 1;
            match self.writes {
                1 => Ok(buf.len()),
                2 => Err(ErrorKind::Interrupted),
                _ => Err(ErrorKind::ConnectionReset),
            }
        }

        fn flush(&mut self) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    #[test]
    fn test_socket_error_treated_as_disconnect() {
        let frame = jpeg_of_len(4096);
        let mut client = ResetAfterOne { writes: 0 };

        let status = StreamTransport::new(1024).send(&mut client, &frame, &ManualClock::new());

        assert_eq!(status, TransferStatus::Aborted { bytes_sent: 1024 });
        assert_eq!(client.writes, 3);
    }
}
