//! Configuration for the valve control server
//!
//! Two inputs: environment variables for server-level settings, and an
//! optional CSV table mapping valve names to serial device paths. When no
//! table is provided the built-in default of four bench devices is used.

use crate::error::{Result, ValveError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Default HTTP port, kept from the original deployment
pub const DEFAULT_PORT: u16 = 8972;

/// Default per-read serial timeout
pub const DEFAULT_SERIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// Built-in device table used when no config file is supplied
///
/// These are the usb-serial adapters wired to the four bench valves,
/// addressed by stable by-id paths.
pub static DEFAULT_VALVES: Lazy<Vec<(String, String)>> = Lazy::new(|| {
    vec![
        (
            "v1".to_string(),
            "/dev/serial/by-id/usb-FTDI_Chipi-X_FT5N6OYA-if00-port0".to_string(),
        ),
        (
            "v2".to_string(),
            "/dev/serial/by-id/usb-Belkin_USB_PDA_Adapter_0109_320165-if00-port0".to_string(),
        ),
        (
            "v3".to_string(),
            "/dev/serial/by-id/usb-FTDI_Chipi-X_FT5N6R5N-if00-port0".to_string(),
        ),
        (
            "v4".to_string(),
            "/dev/serial/by-id/usb-Prolific_Technology_Inc._USB-Serial_Controller_D-if00-port0"
                .to_string(),
        ),
    ]
});

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub port: u16,

    /// Per-read serial timeout in seconds
    pub serial_timeout_secs: u64,

    /// Valve name -> serial device path table
    pub valves: Vec<(String, String)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            serial_timeout_secs: DEFAULT_SERIAL_TIMEOUT.as_secs(),
            valves: DEFAULT_VALVES.clone(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables
    ///
    /// `VALVE_SERVER_PORT` and `VALVE_SERIAL_TIMEOUT_SECS` override the
    /// defaults; the valve table comes from [`ServerConfig::load_valve_table`].
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("VALVE_SERVER_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ValveError::config(format!("invalid VALVE_SERVER_PORT: {port}")))?;
        }

        if let Ok(secs) = std::env::var("VALVE_SERIAL_TIMEOUT_SECS") {
            config.serial_timeout_secs = secs.parse().map_err(|_| {
                ValveError::config(format!("invalid VALVE_SERIAL_TIMEOUT_SECS: {secs}"))
            })?;
        }

        Ok(config)
    }

    /// Per-read serial timeout as a [`Duration`]
    pub fn serial_timeout(&self) -> Duration {
        Duration::from_secs(self.serial_timeout_secs)
    }

    /// Load the valve table from a CSV file, falling back to the defaults
    ///
    /// Format is one `name,address` pair per line. Lines starting with `#`
    /// and lines without exactly one comma are skipped. A missing,
    /// unreadable, or empty file falls back to the built-in table.
    pub fn load_valve_table(&mut self, path: &Path) {
        match parse_valve_table(path) {
            Ok(valves) if !valves.is_empty() => {
                self.valves = valves;
            }
            Ok(_) => {
                warn!(
                    "config file {} contained no usable entries, using default valve table",
                    path.display()
                );
            }
            Err(e) => {
                warn!(
                    "failed to read config file {}: {e}, using default valve table",
                    path.display()
                );
            }
        }
    }
}

/// Parse a `name,address` CSV table
///
/// Tolerant by design: comment and malformed lines are dropped rather
/// than rejected, so a hand-edited bench file never takes the server down.
pub fn parse_valve_table(path: &Path) -> Result<Vec<(String, String)>> {
    let raw = std::fs::read_to_string(path)?;
    let mut valves = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.matches(',').count() != 1 {
            warn!("skipping malformed config line: {line}");
            continue;
        }
        let (name, address) = line.split_once(',').unwrap_or_default();
        let (name, address) = (name.trim(), address.trim());
        if name.is_empty() || address.is_empty() {
            warn!("skipping malformed config line: {line}");
            continue;
        }
        valves.push((name.to_string(), address.to_string()));
    }

    Ok(valves)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_register_four_valves() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8972);
        assert_eq!(config.valves.len(), 4);
        assert_eq!(config.valves[0].0, "v1");
    }
}
