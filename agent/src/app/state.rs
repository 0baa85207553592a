//! Application state management

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use sysinfo::System;
use tracing::info;

use crate::errors::AgentError;
use crate::http::client::ControlPlaneClient;
use crate::kube::driver;
use crate::models::agent::{AgentIdentity, AgentStatus, RegisterRequest};
use crate::telemetry;
use crate::workers::relay::LogRelay;

/// What happened when the control loop offered a command to the live-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Duplicate,
    Full,
}

/// The live-set of in-flight command ids, guarding the concurrency ceiling.
/// All access is serialized; critical sections are a set lookup at most.
pub struct CommandTracker {
    ceiling: usize,
    inflight: Mutex<HashSet<String>>,
    last_error: Mutex<Option<String>>,
}

impl CommandTracker {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            inflight: Mutex::new(HashSet::new()),
            last_error: Mutex::new(None),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Atomically check duplication and capacity, admitting on success
    pub fn admit(&self, id: &str) -> Admission {
        let mut inflight = self.inflight.lock().unwrap();
        if inflight.contains(id) {
            return Admission::Duplicate;
        }
        if inflight.len() >= self.ceiling {
            return Admission::Full;
        }
        inflight.insert(id.to_string());
        Admission::Admitted
    }

    pub fn release(&self, id: &str) {
        self.inflight.lock().unwrap().remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inflight.lock().unwrap().contains(id)
    }

    pub fn len(&self) -> usize {
        self.inflight.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.ceiling
    }

    pub fn record_error(&self, message: impl Into<String>) {
        *self.last_error.lock().unwrap() = Some(message.into());
    }

    pub fn clear_error(&self) {
        *self.last_error.lock().unwrap() = None;
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Liveness status derived from the live-set and the last error
    pub fn status(&self) -> AgentStatus {
        if self.last_error().is_some() {
            AgentStatus::Error
        } else if self.is_full() {
            AgentStatus::Busy
        } else {
            AgentStatus::Online
        }
    }
}

/// Main application state
pub struct AppState {
    /// Control-plane client
    pub client: Arc<ControlPlaneClient>,

    /// Live-set of in-flight commands
    pub tracker: Arc<CommandTracker>,

    /// Fire-and-forget log relay handle
    pub relay: LogRelay,

    /// Identity assigned at registration; None while degraded
    identity: RwLock<Option<AgentIdentity>>,
}

impl AppState {
    pub fn new(client: Arc<ControlPlaneClient>, tracker: Arc<CommandTracker>, relay: LogRelay) -> Self {
        Self {
            client,
            tracker,
            relay,
            identity: RwLock::new(None),
        }
    }

    pub fn identity(&self) -> Option<AgentIdentity> {
        self.identity.read().unwrap().clone()
    }

    pub fn set_identity(&self, identity: AgentIdentity) {
        *self.identity.write().unwrap() = Some(identity);
    }

    pub fn is_registered(&self) -> bool {
        self.identity.read().unwrap().is_some()
    }

    /// Build the registration request from the host
    pub async fn registration_request(&self) -> RegisterRequest {
        RegisterRequest {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            kube_version: driver::kube_version().await,
            resources: telemetry::host_resources(),
        }
    }

    /// One registration attempt; used by the heartbeat loop while degraded
    pub async fn register_once(&self) -> Result<(), AgentError> {
        let request = self.registration_request().await;
        let identity = self.client.register(&request).await?;
        info!("Registered as agent {} ({})", identity.name, identity.id);
        self.set_identity(identity);
        Ok(())
    }
}
