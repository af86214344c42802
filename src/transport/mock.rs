//! Mock transport implementations for testing
//!
//! Simulates a VICI actuator well enough for the session and dispatcher
//! tests: answers the probe with the command-list banner, tracks the
//! current position across `GO`/`CP`, and stays quiet after movement
//! commands the way a real device in IFM0 mode does.
//!
//! Every write and read is appended to a shared [`WriteLog`] so tests can
//! assert that operations on one device never interleave.

use super::{TransportFactory, ValveTransport, LINE_TERMINATOR};
use crate::error::{Result, ValveError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared capture of transport traffic, one entry per write or read
///
/// Writes are logged as the command line, reads as `"<read>"`.
pub type WriteLog = Arc<Mutex<Vec<String>>>;

/// Probe banner a healthy actuator returns for `/?`
pub const COMMAND_LIST_BANNER: &str = "Control Command List\r\n\
GO[nn] Moves Actuator to Position nn\r\n\
CP Displays Current Position\r\n\
AM[n] Sets Actuator Mode\r\n\
IFM[n] Sets Response Mode\r\n\
/? Displays This List\r\n";

/// Scripted in-memory valve transport
pub struct MockTransport {
    log: WriteLog,
    pending: VecDeque<Vec<u8>>,
    overrides: HashMap<String, String>,
    position: Arc<AtomicU8>,
    banner: String,
    silent: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    write_delay: Option<Duration>,
}

impl MockTransport {
    /// Create a healthy mock starting at position 1
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            pending: VecDeque::new(),
            overrides: HashMap::new(),
            position: Arc::new(AtomicU8::new(1)),
            banner: COMMAND_LIST_BANNER.to_string(),
            silent: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            write_delay: None,
        }
    }

    /// Start at a specific valve position
    pub fn with_position(self, position: u8) -> Self {
        self.position.store(position, Ordering::SeqCst);
        self
    }

    /// Replace the probe banner (e.g. to simulate the wrong device)
    pub fn with_banner<S: Into<String>>(mut self, banner: S) -> Self {
        self.banner = banner.into();
        self
    }

    /// Script a fixed reply for one exact command line
    pub fn with_override<S: Into<String>>(mut self, command: S, reply: S) -> Self {
        self.overrides.insert(command.into(), reply.into());
        self
    }

    /// Never answer anything; reads fail with a timeout
    pub fn silent(self) -> Self {
        self.silent.store(true, Ordering::SeqCst);
        self
    }

    /// Sleep inside each write, widening the window for interleaving bugs
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Handle to the shared traffic log
    pub fn write_log(&self) -> WriteLog {
        Arc::clone(&self.log)
    }

    fn queue_line(&mut self, line: &str) {
        let mut frame = line.as_bytes().to_vec();
        frame.extend_from_slice(LINE_TERMINATOR);
        self.pending.push_back(frame);
    }

    /// Compute the device's reaction to one command line
    ///
    /// A leading addressing-id digit string is stripped the way a
    /// daisy-chained actuator ignores its own prefix.
    fn react(&mut self, line: &str) {
        if self.silent.load(Ordering::SeqCst) {
            return;
        }
        if let Some(reply) = self.overrides.get(line).cloned() {
            self.queue_line(&reply);
            return;
        }

        let core = line.trim_start_matches(|c: char| c.is_ascii_digit());
        match core {
            "/?" => self.pending.push_back(self.banner.as_bytes().to_vec()),
            "CP" => {
                let position = self.position.load(Ordering::SeqCst);
                self.queue_line(&format!("CP{position:02}"));
            }
            "AM" => self.queue_line("AM3"),
            "IFM" => self.queue_line("IFM0"),
            _ => {
                // Movement and mode-set commands get no reply in IFM0 mode
                if let Some(digits) = core.strip_prefix("GO") {
                    if let Ok(p) = digits.parse::<u8>() {
                        self.position.store(p, Ordering::SeqCst);
                    }
                }
            }
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValveTransport for MockTransport {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ValveError::connection("mock: write failed"));
        }
        self.log.lock().unwrap().push(line.to_string());
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.react(line);
        Ok(())
    }

    async fn read_until(&mut self, _terminator: &[u8], _timeout: Duration) -> Result<Vec<u8>> {
        match self.pending.pop_front() {
            Some(frame) => {
                self.log.lock().unwrap().push("<read>".to_string());
                Ok(frame)
            }
            None => Err(ValveError::timeout("mock: no scripted reply")),
        }
    }

    async fn flush_input(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }
}

/// Behavior of transports handed out by a [`MockFactory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Normal actuator: probe banner, position tracking
    Healthy,
    /// Opening the port fails outright (device unplugged)
    RefuseOpen,
    /// Port opens but the probe returns the wrong banner (wrong device)
    BadBanner,
    /// Port opens but the device never answers (dead cable)
    Silent,
}

/// Transport factory producing scripted mocks
///
/// All transports created by one factory share the traffic log and the
/// simulated valve position, so a session that reopens its port keeps
/// talking to the "same" device.
pub struct MockFactory {
    behavior: MockBehavior,
    log: WriteLog,
    overrides: HashMap<String, String>,
    position: Arc<AtomicU8>,
    opens: Arc<AtomicU32>,
    fail_writes: Arc<AtomicBool>,
    write_delay: Option<Duration>,
}

impl MockFactory {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            log: Arc::new(Mutex::new(Vec::new())),
            overrides: HashMap::new(),
            position: Arc::new(AtomicU8::new(1)),
            opens: Arc::new(AtomicU32::new(0)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            write_delay: None,
        }
    }

    /// Script a fixed reply for one exact command line on every transport
    pub fn with_override<S: Into<String>>(mut self, command: S, reply: S) -> Self {
        self.overrides.insert(command.into(), reply.into());
        self
    }

    /// Start the simulated device at a specific position
    pub fn with_position(self, position: u8) -> Self {
        self.position.store(position, Ordering::SeqCst);
        self
    }

    /// Add a per-write delay to widen race windows in concurrency tests
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Number of times `open` has been called
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Handle to the shared traffic log
    pub fn write_log(&self) -> WriteLog {
        Arc::clone(&self.log)
    }

    /// Current simulated valve position
    pub fn position(&self) -> u8 {
        self.position.load(Ordering::SeqCst)
    }

    /// Make every subsequent write on live transports fail
    pub fn poison_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

impl TransportFactory for MockFactory {
    fn open(&self, _address: &str) -> Result<Box<dyn ValveTransport>> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        if self.behavior == MockBehavior::RefuseOpen {
            return Err(ValveError::connection("mock: open refused"));
        }

        let mut transport = MockTransport {
            log: Arc::clone(&self.log),
            pending: VecDeque::new(),
            overrides: self.overrides.clone(),
            position: Arc::clone(&self.position),
            banner: COMMAND_LIST_BANNER.to_string(),
            silent: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::clone(&self.fail_writes),
            write_delay: self.write_delay,
        };

        match self.behavior {
            MockBehavior::BadBanner => {
                transport.banner = "SYNTAX ERROR\r\nDisplays This List\r\n".to_string();
            }
            MockBehavior::Silent => {
                transport.silent.store(true, Ordering::SeqCst);
            }
            _ => {}
        }

        Ok(Box::new(transport))
    }
}
