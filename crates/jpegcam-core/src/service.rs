//! The request-serving half of a tick, as seen by the supervisor.

use std::sync::mpsc::Receiver;

use crate::router::Outcome;

/// Something that answers HTTP requests and reports what became of them.
pub trait RequestService {
    /// Serve or collect at most one request. Must not block waiting for one.
    fn poll(&mut self) -> Option<Outcome>;
}

/// Outcomes reported by a server that answers requests on its own task.
impl RequestService for Receiver<Outcome> {
    fn poll(&mut self) -> Option<Outcome> {
        self.try_recv().ok()
    }
}
