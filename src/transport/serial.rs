//! tokio-serial transport implementation

use super::{ValveTransport, LINE_TERMINATOR};
use crate::error::{Result, ValveError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::trace;

/// VICI actuators ship at 9600 baud, 8N1
const BAUD_RATE: u32 = 9600;

/// Serial transport backed by a tokio-serial stream
pub struct SerialPortTransport {
    port: SerialStream,
}

impl SerialPortTransport {
    /// Open the serial device at `address` (e.g. a /dev/serial/by-id path)
    pub fn open(address: &str) -> Result<Self> {
        let port = tokio_serial::new(address, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()?;

        trace!("opened serial port {address} at {BAUD_RATE} baud");
        Ok(Self { port })
    }
}

#[async_trait]
impl ValveTransport for SerialPortTransport {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut frame = Vec::with_capacity(line.len() + LINE_TERMINATOR.len());
        frame.extend_from_slice(line.as_bytes());
        frame.extend_from_slice(LINE_TERMINATOR);
        self.port.write_all(&frame).await?;
        self.port.flush().await?;
        Ok(())
    }

    async fn read_until(&mut self, terminator: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut buf = Vec::new();
        let mut chunk = [0u8; 64];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ValveError::timeout(format!(
                    "no terminator within {timeout:?} ({} bytes buffered)",
                    buf.len()
                )));
            }

            let n = match tokio::time::timeout(remaining, self.port.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    return Err(ValveError::connection("serial port closed during read"))
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(ValveError::timeout(format!(
                        "no terminator within {timeout:?} ({} bytes buffered)",
                        buf.len()
                    )))
                }
            };

            buf.extend_from_slice(&chunk[..n]);
            if buf
                .windows(terminator.len())
                .any(|window| window == terminator)
            {
                return Ok(buf);
            }
        }
    }

    async fn flush_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
