//! Process-wide registry of valve sessions
//!
//! Built once at startup and read-only afterwards: membership never
//! changes, only the sessions inside mutate. Each session sits behind its
//! own `tokio::sync::Mutex`, which is the serialization boundary keeping
//! commands to one physical valve from interleaving on the wire.

use crate::config::ServerConfig;
use crate::session::ValveSession;
use crate::transport::TransportFactory;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Registry mapping logical valve names to sessions
#[derive(Default)]
pub struct ValveRegistry {
    sessions: HashMap<String, Arc<Mutex<ValveSession>>>,
}

impl ValveRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from a config table and open every session
    ///
    /// A valve that fails to open stays registered in the Closed state so
    /// later requests can retry it.
    pub async fn from_config(config: &ServerConfig, factory: Arc<dyn TransportFactory>) -> Self {
        let mut registry = Self::new();
        for (name, address) in &config.valves {
            let session = ValveSession::new(
                name.clone(),
                address.clone(),
                None,
                config.serial_timeout(),
                Arc::clone(&factory),
            );
            registry.register(session);
        }
        registry.connect_all().await;
        registry
    }

    /// Add a session under its own name
    ///
    /// A duplicate name replaces the previous session and is reported,
    /// since it almost always means a bad config file.
    pub fn register(&mut self, session: ValveSession) {
        let name = session.name().to_string();
        if self
            .sessions
            .insert(name.clone(), Arc::new(Mutex::new(session)))
            .is_some()
        {
            warn!("duplicate valve name {name:?} in configuration, keeping the last entry");
        }
    }

    /// Look up a session by valve name
    pub fn lookup(&self, name: &str) -> Option<Arc<Mutex<ValveSession>>> {
        self.sessions.get(name).cloned()
    }

    /// Registered valve names, sorted
    pub fn valve_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered valves
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// True when every registered session is open
    pub async fn all_open(&self) -> bool {
        for session in self.sessions.values() {
            if !session.lock().await.is_open() {
                return false;
            }
        }
        true
    }

    /// Per-valve open/closed snapshot
    pub async fn status_snapshot(&self) -> BTreeMap<String, bool> {
        let mut snapshot = BTreeMap::new();
        for (name, session) in &self.sessions {
            snapshot.insert(name.clone(), session.lock().await.is_open());
        }
        snapshot
    }

    /// Attempt to open every Closed session and log a health summary
    ///
    /// Opens run concurrently; a slow or absent device must not stretch
    /// startup by its full timeout for every valve behind it.
    pub async fn connect_all(&self) {
        join_all(self.sessions.iter().map(|(name, session)| async move {
            let mut session = session.lock().await;
            if !session.is_open() {
                if let Err(e) = session.open().await {
                    warn!(valve = %name, "initial open failed: {e}");
                }
            }
        }))
        .await;

        if self.all_open().await {
            info!("all valve connections good");
        } else {
            for (name, open) in self.status_snapshot().await {
                if !open {
                    warn!(valve = %name, "connection is not open");
                }
            }
        }
    }
}
