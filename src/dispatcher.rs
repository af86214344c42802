//! Command dispatch from logical requests to device sessions
//!
//! The dispatcher resolves a valve name through the registry and holds
//! that session's mutex for the entire device operation, so two requests
//! for the same valve can never interleave their serial traffic while
//! requests for different valves proceed concurrently.

use crate::error::{Result, ValveError};
use crate::registry::ValveRegistry;
use crate::session::{MAX_POSITION, MIN_POSITION};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Sentinel returned by `get_status_all` when every valve is open
///
/// Clients rely on this compact-success / verbose-failure asymmetry, so
/// the shape is preserved as-is.
pub const ALL_OPEN: &str = "all_open";

/// Message used when a device operation fails for transport reasons
const NOT_AVAILABLE: &str = "valve not available";

/// Recognized command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
    GetStatus,
    GetStatusAll,
    GetValvePosition,
    SetValvePosition,
}

impl CommandId {
    /// Parse the wire-level `id` field
    pub fn parse(id: &str) -> Option<Self> {
        match id {
            "get_status" => Some(Self::GetStatus),
            "get_status_all" => Some(Self::GetStatusAll),
            "get_valve_position" => Some(Self::GetValvePosition),
            "set_valve_position" => Some(Self::SetValvePosition),
            _ => None,
        }
    }

    /// Whether the command addresses a single named valve
    pub fn needs_valve(&self) -> bool {
        !matches!(self, Self::GetStatusAll)
    }
}

/// One inbound command, built per HTTP request and discarded after use
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub id: CommandId,
    pub valve: Option<String>,
    pub position: Option<String>,
}

/// Result of dispatching one command
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Command ran; payload goes into the success envelope
    Success(Value),
    /// Valve name not registered
    UnknownValve,
    /// Command failed; message goes into the failure envelope
    Failure(String),
}

/// Route one command to the right session and run it
///
/// Caller mistakes keep their specific message; device-side failures all
/// collapse to the generic not-available signal so the HTTP layer never
/// leaks transport detail to clients.
pub async fn dispatch(registry: &ValveRegistry, request: &CommandRequest) -> DispatchOutcome {
    debug!(?request, "dispatching command");

    match run_command(registry, request).await {
        Ok(data) => DispatchOutcome::Success(data),
        Err(ValveError::NotFound(name)) => {
            warn!(valve = %name, "valve name not found");
            DispatchOutcome::UnknownValve
        }
        Err(ValveError::InvalidInput(message)) => DispatchOutcome::Failure(message),
        Err(e) => {
            warn!(command = ?request.id, "command failed: {e}");
            DispatchOutcome::Failure(NOT_AVAILABLE.to_string())
        }
    }
}

async fn run_command(registry: &ValveRegistry, request: &CommandRequest) -> Result<Value> {
    if request.id == CommandId::GetStatusAll {
        return if registry.all_open().await {
            Ok(json!(ALL_OPEN))
        } else {
            Ok(json!(registry.status_snapshot().await))
        };
    }

    let name = request
        .valve
        .as_deref()
        .ok_or_else(|| ValveError::invalid_input("missing valve argument"))?;
    let session = registry
        .lookup(name)
        .ok_or_else(|| ValveError::not_found(name))?;

    match request.id {
        CommandId::GetStatus => {
            let session = session.lock().await;
            Ok(json!(session.is_open()))
        }
        CommandId::GetValvePosition => {
            let mut session = session.lock().await;
            let position = session.get_position().await?;
            Ok(json!(position))
        }
        CommandId::SetValvePosition => {
            let raw = request
                .position
                .as_deref()
                .ok_or_else(|| ValveError::invalid_input("missing position argument"))?;
            let position = match raw.trim().parse::<u8>() {
                Ok(p) if (MIN_POSITION..=MAX_POSITION).contains(&p) => p,
                _ => {
                    return Err(ValveError::invalid_input(format!(
                        "invalid position argument: {raw:?}"
                    )));
                }
            };

            let mut session = session.lock().await;
            session.set_position(position).await?;
            Ok(json!(1))
        }
        CommandId::GetStatusAll => unreachable!("handled above"),
    }
}
