//! Per-valve protocol session
//!
//! One [`ValveSession`] owns the transport to one physical VICI actuator
//! and implements its text protocol:
//!
//! | command | meaning                                      |
//! |---------|----------------------------------------------|
//! | `/?`    | command list, used as the connection probe   |
//! | `CP`    | query current position                       |
//! | `GO<p>` | move to position p                           |
//! | `AM`    | actuator mode, 3 = multiposition             |
//! | `IFM`   | response mode, 0 = no reply to action cmds   |
//!
//! Movement commands are fire-and-forget: the actuator is slow to answer
//! and the control loop must stay responsive, so `set_position` updates
//! the cached position optimistically and never waits for a reply.

use crate::error::{Result, ValveError};
use crate::transport::{TransportFactory, ValveTransport, LINE_TERMINATOR};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Consecutive failed opens tolerated before a call fails fast
pub const MAX_OPEN_ATTEMPTS: u32 = 5;

/// Lowest addressable port on a 12-port actuator
pub const MIN_POSITION: u8 = 1;

/// Highest addressable port on a 12-port actuator
pub const MAX_POSITION: u8 = 12;

/// First line of the `/?` reply on a healthy actuator
const COMMAND_LIST_HEADER: &str = "Control Command List";

/// Last line of the `/?` reply, used as the probe read terminator
const COMMAND_LIST_SENTINEL: &[u8] = b"Displays This List\r\n";

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No usable transport; operations trigger a reconnect attempt
    Closed,
    /// Probe succeeded, modes checked, commands may be sent
    Ready,
}

/// Protocol session for one physical valve controller
pub struct ValveSession {
    name: String,
    address: String,
    addressing_id: Option<u8>,
    state: SessionState,
    transport: Option<Box<dyn ValveTransport>>,
    last_known_position: Option<u8>,
    open_attempts: u32,
    timeout: Duration,
    factory: Arc<dyn TransportFactory>,
}

impl ValveSession {
    /// Create a session in the Closed state; no I/O happens here
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        addressing_id: Option<u8>,
        timeout: Duration,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            addressing_id,
            state: SessionState::Closed,
            transport: None,
            last_known_position: None,
            open_attempts: 0,
            timeout,
            factory,
        }
    }

    /// Logical valve name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serial device address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the session is connected and probed
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Last position reported by or sent to the device
    ///
    /// Optimistically updated by `set_position`; meaningless while the
    /// session is Closed.
    pub fn last_known_position(&self) -> Option<u8> {
        self.last_known_position
    }

    /// Consecutive failed open attempts so far
    pub fn open_attempts(&self) -> u32 {
        self.open_attempts
    }

    /// Open the transport and validate the device with the `/?` probe
    ///
    /// A garbage or missing banner means the wrong device or a bad cable,
    /// so the session stays Closed and the attempt counter grows. On
    /// success the actuator is switched to multiposition mode (`AM3`) and
    /// told not to answer action commands (`IFM0`).
    pub async fn open(&mut self) -> Result<()> {
        debug!(valve = %self.name, address = %self.address, "opening serial connection");

        match self.try_probe().await {
            Ok(()) => {
                self.state = SessionState::Ready;
                self.open_attempts = 0;
                info!(valve = %self.name, "serial connection ready");
                self.check_actuator_mode().await;
                self.check_response_mode().await;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Closed;
                self.transport = None;
                self.open_attempts += 1;
                warn!(
                    valve = %self.name,
                    attempts = self.open_attempts,
                    "failed to open serial connection: {e}"
                );
                Err(e)
            }
        }
    }

    async fn try_probe(&mut self) -> Result<()> {
        let mut transport = self.factory.open(&self.address)?;

        let probe = self.command_line("/?");
        transport.write_line(&probe).await?;
        let raw = transport
            .read_until(COMMAND_LIST_SENTINEL, self.timeout)
            .await?;

        let banner = String::from_utf8_lossy(&raw);
        if !banner.trim_start().starts_with(COMMAND_LIST_HEADER) {
            return Err(ValveError::connection(format!(
                "unexpected probe response from {}: {:?}",
                self.address,
                banner.lines().next().unwrap_or_default()
            )));
        }

        self.transport = Some(transport);
        Ok(())
    }

    /// Query the current position (`CP`)
    ///
    /// Reconnects implicitly if the session is Closed. A reply that does
    /// not parse as `CP<digits>` in range is a protocol error.
    pub async fn get_position(&mut self) -> Result<u8> {
        let reply = self.send_get("CP").await?;

        let position = reply
            .strip_prefix("CP")
            .and_then(|digits| digits.trim().parse::<u8>().ok())
            .filter(|p| (MIN_POSITION..=MAX_POSITION).contains(p))
            .ok_or_else(|| {
                ValveError::protocol(format!("malformed position reply: {reply:?}"))
            })?;

        self.last_known_position = Some(position);
        debug!(valve = %self.name, position, "current position");
        Ok(position)
    }

    /// Move to position `p` (`GO<p>`), fire-and-forget
    ///
    /// The reply is deliberately not awaited: mechanical movement is slow
    /// relative to the control loop, and IFM0 suppresses the response
    /// anyway. The cached position is updated optimistically once the
    /// write succeeds.
    pub async fn set_position(&mut self, position: u8) -> Result<()> {
        if !(MIN_POSITION..=MAX_POSITION).contains(&position) {
            return Err(ValveError::invalid_input(format!(
                "position {position} outside {MIN_POSITION}..={MAX_POSITION}"
            )));
        }

        self.send(&format!("GO{position}")).await?;
        self.last_known_position = Some(position);
        debug!(valve = %self.name, position, "requested position");
        Ok(())
    }

    /// Send a command without reading a reply, reconnecting if Closed
    async fn send(&mut self, command: &str) -> Result<()> {
        self.ensure_ready().await?;
        self.raw_write(command).await
    }

    /// Send a command and read one reply, reconnecting if Closed
    async fn send_get(&mut self, command: &str) -> Result<String> {
        self.ensure_ready().await?;
        self.raw_exchange(command).await
    }

    /// Write one command line on the current transport; error closes
    ///
    /// No reconnect happens here, which keeps the open path free of
    /// recursion: `open` runs the mode checks through these raw helpers.
    async fn raw_write(&mut self, command: &str) -> Result<()> {
        let line = self.command_line(command);
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| ValveError::connection("no transport"))?;

        if let Err(e) = transport.write_line(&line).await {
            warn!(valve = %self.name, "write failed, closing session: {e}");
            self.close();
            return Err(e);
        }
        Ok(())
    }

    /// Flush, write, and read one CR LF terminated reply; error closes
    async fn raw_exchange(&mut self, command: &str) -> Result<String> {
        let line = self.command_line(command);
        let timeout = self.timeout;
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| ValveError::connection("no transport"))?;

        let result = async {
            transport.flush_input().await?;
            transport.write_line(&line).await?;
            transport.read_until(LINE_TERMINATOR, timeout).await
        }
        .await;

        match result {
            Ok(raw) => Ok(String::from_utf8_lossy(&raw).trim().to_string()),
            Err(e) => {
                warn!(valve = %self.name, command, "exchange failed, closing session: {e}");
                self.close();
                Err(e)
            }
        }
    }

    /// Reconnect if necessary, bounded by [`MAX_OPEN_ATTEMPTS`]
    ///
    /// At the cap the call fails fast without touching I/O and the counter
    /// resets, so the next request gets a fresh round of attempts once
    /// someone has had a chance to re-seat the cable.
    async fn ensure_ready(&mut self) -> Result<()> {
        if self.state == SessionState::Ready {
            return Ok(());
        }

        if self.open_attempts >= MAX_OPEN_ATTEMPTS {
            warn!(
                valve = %self.name,
                "giving up after {MAX_OPEN_ATTEMPTS} open attempts; device off or cable unplugged?"
            );
            self.open_attempts = 0;
            return Err(ValveError::ConnectionExhausted(format!(
                "{}: {MAX_OPEN_ATTEMPTS} consecutive open attempts failed",
                self.name
            )));
        }

        self.open().await
    }

    /// Verify the actuator is in multiposition mode, fixing it if not
    ///
    /// Failures here are logged and swallowed; a valve that answers the
    /// probe but flubs a mode query is still worth keeping Ready.
    async fn check_actuator_mode(&mut self) {
        match self.raw_exchange("AM").await {
            Ok(reply) if reply == "AM3" => {
                debug!(valve = %self.name, "multiposition mode confirmed");
            }
            Ok(reply) => {
                info!(valve = %self.name, "changing actuator mode from {reply:?} to AM3");
                if let Err(e) = self.raw_write("AM3").await {
                    warn!(valve = %self.name, "failed to set actuator mode: {e}");
                }
            }
            Err(e) => warn!(valve = %self.name, "failed to check actuator mode: {e}"),
        }
    }

    /// Verify the actuator suppresses action-command replies (IFM0)
    async fn check_response_mode(&mut self) {
        match self.raw_exchange("IFM").await {
            Ok(reply) if reply == "IFM0" => {
                debug!(valve = %self.name, "response mode confirmed");
            }
            Ok(reply) => {
                info!(valve = %self.name, "changing response mode from {reply:?} to IFM0");
                if let Err(e) = self.raw_write("IFM0").await {
                    warn!(valve = %self.name, "failed to set response mode: {e}");
                }
            }
            Err(e) => warn!(valve = %self.name, "failed to check response mode: {e}"),
        }
    }

    /// Drop the transport and mark the session Closed
    pub fn close(&mut self) {
        self.transport = None;
        self.state = SessionState::Closed;
    }

    /// Prefix the addressing id for daisy-chained devices
    fn command_line(&self, command: &str) -> String {
        match self.addressing_id {
            Some(id) => format!("{id}{command}"),
            None => command.to_string(),
        }
    }
}

impl std::fmt::Debug for ValveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValveSession")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("addressing_id", &self.addressing_id)
            .field("state", &self.state)
            .field("last_known_position", &self.last_known_position)
            .field("open_attempts", &self.open_attempts)
            .finish()
    }
}
