//! In-memory fakes for the hardware and network seams.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::CameraConfig;
use crate::connectivity::{ConnectionState, NetworkInfo, WifiLink};
use crate::frame::CameraDriver;
use crate::net::Acceptor;

// ============================================================================
// Clock
// ============================================================================

/// Clock that only moves when slept on. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
    sleeps: Rc<Cell<usize>>,
    yields: Rc<Cell<usize>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> usize {
        self.sleeps.get()
    }

    pub fn yields(&self) -> usize {
        self.yields.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
        self.sleeps.set(self.sleeps.get() + 1);
    }

    fn yield_now(&self) {
        self.yields.set(self.yields.get() + 1);
    }
}

// ============================================================================
// WiFi
// ============================================================================

/// Scripted radio: connects on the n-th status poll and optionally drops later.
pub struct FakeLink {
    connected_from: Option<usize>,
    dropped_from: Option<usize>,
    failing_setup: bool,
    polls: Rc<Cell<usize>>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl FakeLink {
    pub fn connects_after(polls: usize) -> Self {
        Self {
            connected_from: Some(polls),
            dropped_from: None,
            failing_setup: false,
            polls: Rc::default(),
            calls: Rc::default(),
        }
    }

    pub fn never_connects() -> Self {
        Self {
            connected_from: None,
            ..Self::connects_after(0)
        }
    }

    /// Report `Disconnected` from the given status poll onwards.
    pub fn drops_after(mut self, polls: usize) -> Self {
        self.dropped_from = Some(polls);
        self
    }

    pub fn failing_setup(mut self) -> Self {
        self.failing_setup = true;
        self
    }

    pub fn calls(&self) -> Rc<RefCell<Vec<String>>> {
        self.calls.clone()
    }

    pub fn polls(&self) -> Rc<Cell<usize>> {
        self.polls.clone()
    }

    fn record(&self, call: String) -> Result<(), String> {
        let failing = self.failing_setup && call != "status";
        self.calls.borrow_mut().push(call);
        if failing {
            Err("radio refused".to_string())
        } else {
            Ok(())
        }
    }
}

impl WifiLink for FakeLink {
    type Error = String;

    fn reset(&mut self) -> Result<(), String> {
        self.record("reset".to_string())
    }

    fn configure_radio(
        &mut self,
        tx_power_quarter_dbm: i8,
        power_save: bool,
    ) -> Result<(), String> {
        self.record(format!(
            "configure_radio({}, {})",
            tx_power_quarter_dbm, power_save
        ))
    }

    fn begin(&mut self, ssid: &str, _password: &str) -> Result<(), String> {
        self.record(format!("begin({})", ssid))
    }

    fn status(&mut self) -> ConnectionState {
        let _ = self.record("status".to_string());
        let poll = self.polls.get();
        self.polls.set(poll + 1);

        if self.dropped_from.is_some_and(|n| poll >= n) {
            return ConnectionState::Disconnected;
        }
        match self.connected_from {
            Some(n) if poll >= n => ConnectionState::Connected,
            Some(_) => ConnectionState::Connecting,
            None => ConnectionState::Disconnected,
        }
    }

    fn network_info(&self) -> Option<NetworkInfo> {
        Some(NetworkInfo {
            ip: Ipv4Addr::new(192, 168, 4, 20),
            gateway: Ipv4Addr::new(192, 168, 4, 1),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
        })
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Bookkeeping shared between a [`FakeCamera`] and the test that owns it.
#[derive(Debug, Default)]
pub struct CameraLedger {
    pub inits: Cell<usize>,
    pub acquired: Cell<usize>,
    pub released: Cell<usize>,
    pub outstanding: Cell<usize>,
    pub max_outstanding: Cell<usize>,
}

/// Camera whose captures come from a script; `None` entries fail.
pub struct FakeCamera {
    script: VecDeque<Option<Vec<u8>>>,
    init_code: Option<i32>,
    slot: Option<Vec<u8>>,
    ledger: Rc<CameraLedger>,
}

impl FakeCamera {
    pub fn new(script: Vec<Option<Vec<u8>>>) -> Self {
        Self {
            script: script.into(),
            init_code: None,
            slot: None,
            ledger: Rc::default(),
        }
    }

    /// A camera that always delivers a frame of `len` bytes.
    pub fn with_frame(len: usize) -> Self {
        Self::new(vec![Some(jpeg_of_len(len))])
    }

    pub fn failing_init(mut self, code: i32) -> Self {
        self.init_code = Some(code);
        self
    }

    pub fn ledger(&self) -> Rc<CameraLedger> {
        self.ledger.clone()
    }
}

/// Opaque token for the single hardware slot.
#[derive(Debug)]
pub struct FakeHandle;

impl CameraDriver for FakeCamera {
    type Handle = FakeHandle;

    fn init(&mut self, _config: &CameraConfig) -> Result<(), i32> {
        self.ledger.inits.set(self.ledger.inits.get() + 1);
        match self.init_code {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn capture(&mut self) -> Option<FakeHandle> {
        assert!(self.slot.is_none(), "capture while the frame slot is held");

        // The last script entry repeats forever.
        let next = if self.script.len() > 1 {
            self.script.pop_front().flatten()
        } else {
            self.script.front().cloned().flatten()
        };
        let bytes = next?;

        let ledger = &self.ledger;
        ledger.acquired.set(ledger.acquired.get() + 1);
        ledger.outstanding.set(ledger.outstanding.get() + 1);
        ledger
            .max_outstanding
            .set(ledger.max_outstanding.get().max(ledger.outstanding.get()));
        self.slot = Some(bytes);
        Some(FakeHandle)
    }

    fn data<'a>(&'a self, _handle: &'a FakeHandle) -> &'a [u8] {
        self.slot.as_deref().unwrap_or_default()
    }

    fn release(&mut self, _handle: FakeHandle) {
        assert!(self.slot.take().is_some(), "release without a held frame");
        let ledger = &self.ledger;
        ledger.released.set(ledger.released.get() + 1);
        ledger.outstanding.set(ledger.outstanding.get() - 1);
    }
}

/// Bytes shaped like a JPEG (SOI ... EOI) of exactly `len` bytes.
pub fn jpeg_of_len(len: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    if len >= 4 {
        bytes[0] = 0xFF;
        bytes[1] = 0xD8;
        bytes[len - 2] = 0xFF;
        bytes[len - 1] = 0xD9;
    }
    bytes
}

// ============================================================================
// Network
// ============================================================================

/// Client socket with a scripted request and a limited write budget.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    request: io::Cursor<Vec<u8>>,
    /// Total bytes accepted before every write returns zero.
    budget: Option<usize>,
    /// Cap on bytes accepted by one write call.
    max_per_write: Option<usize>,
    pub output: Vec<u8>,
    pub write_sizes: Vec<usize>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(request: &str) -> Self {
        Self {
            request: io::Cursor::new(request.as_bytes().to_vec()),
            ..Default::default()
        }
    }

    pub fn budget(mut self, bytes: usize) -> Self {
        self.budget = Some(bytes);
        self
    }

    pub fn max_per_write(mut self, bytes: usize) -> Self {
        self.max_per_write = Some(bytes);
        self
    }

    /// Bytes written after the response head.
    pub fn body(&self) -> &[u8] {
        match self.output.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(at) => &self.output[at + 4..],
            None => &[],
        }
    }

    /// Response head as text, without the blank line.
    pub fn head(&self) -> String {
        let end = self
            .output
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .unwrap_or(self.output.len());
        String::from_utf8_lossy(&self.output[..end]).into_owned()
    }
}

impl Read for ScriptedClient {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.request.read(buf)
    }
}

impl Write for ScriptedClient {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut n = buf.len();
        if let Some(cap) = self.max_per_write {
            n = n.min(cap);
        }
        if let Some(budget) = self.budget {
            n = n.min(budget.saturating_sub(self.output.len()));
        }
        self.output.extend_from_slice(&buf[..n]);
        self.write_sizes.push(n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Handle to a [`ScriptedClient`] that the test keeps after the loop drops it.
#[derive(Debug, Clone)]
pub struct SharedClient(pub Rc<RefCell<ScriptedClient>>);

impl Read for SharedClient {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.borrow_mut().read(buf)
    }
}

impl Write for SharedClient {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Acceptor handing out queued clients, one per poll.
#[derive(Default)]
pub struct QueueAcceptor {
    pending: VecDeque<SharedClient>,
}

impl QueueAcceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a client and keep a handle on it.
    pub fn push(&mut self, client: ScriptedClient) -> Rc<RefCell<ScriptedClient>> {
        let shared = Rc::new(RefCell::new(client));
        self.pending.push_back(SharedClient(shared.clone()));
        shared
    }
}

impl Acceptor for QueueAcceptor {
    type Stream = SharedClient;

    fn poll_accept(&mut self) -> io::Result<Option<SharedClient>> {
        Ok(self.pending.pop_front())
    }
}
