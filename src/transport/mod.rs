//! Serial transport abstraction for valve controllers
//!
//! The session layer talks to hardware through the [`ValveTransport`]
//! trait so tests can substitute a scripted mock for a live serial port.
//! No retries happen here; reconnect policy belongs to the session.

pub mod mock;
pub mod serial;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use mock::{MockTransport, WriteLog};
pub use serial::SerialPortTransport;

/// Line terminator used by the VICI text protocol
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Byte-stream transport to one valve controller
#[async_trait]
pub trait ValveTransport: Send {
    /// Write one command line, appending CR LF
    async fn write_line(&mut self, line: &str) -> Result<()>;

    /// Read until `terminator` is seen or `timeout` elapses
    ///
    /// On timeout the call fails with [`crate::error::ValveError::Timeout`];
    /// partial data is never returned silently.
    async fn read_until(&mut self, terminator: &[u8], timeout: Duration) -> Result<Vec<u8>>;

    /// Discard any pending inbound bytes
    async fn flush_input(&mut self) -> Result<()>;
}

/// Factory for opening transports, one per device address
///
/// The registry holds one of these so session construction stays
/// independent of whether the backend is real hardware or a mock.
pub trait TransportFactory: Send + Sync {
    /// Open a transport to the given device address
    fn open(&self, address: &str) -> Result<Box<dyn ValveTransport>>;
}

/// Opens real serial ports via tokio-serial
pub struct SerialTransportFactory;

impl TransportFactory for SerialTransportFactory {
    fn open(&self, address: &str) -> Result<Box<dyn ValveTransport>> {
        Ok(Box::new(SerialPortTransport::open(address)?))
    }
}
