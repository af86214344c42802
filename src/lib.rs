//! Async control server for VICI multiposition valves
//!
//! Talks to each 12-port rotary selector valve over its own serial line
//! and exposes a small form-encoded HTTP API for remote UIs. Layered
//! leaf-first:
//!
//! - [`transport`]: framed serial exchange with per-read timeouts
//! - [`session`]: per-valve protocol state machine and reconnect policy
//! - [`registry`]: name to session table, built once at startup
//! - [`dispatcher`]: command routing with per-valve mutual exclusion
//! - [`http_server`]: the `POST /api` endpoint and response envelope

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http_server;
pub mod logging;
pub mod registry;
pub mod session;
pub mod transport;

pub use config::ServerConfig;
pub use error::{Result, ValveError};
pub use registry::ValveRegistry;
pub use session::ValveSession;
