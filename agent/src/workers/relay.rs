//! Fire-and-forget log relay worker
//!
//! All best-effort pushes to the control plane go through one bounded queue
//! with a dedicated worker: no dangling futures, and a full queue drops the
//! message instead of blocking the producer. Consumers of the stream must
//! treat it as lossy and unordered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::http::client::ControlPlaneClient;
use crate::http::control_plane::DeploymentLogEntry;

/// Queue depth before messages are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum RelayEvent {
    Log {
        deployment_id: String,
        entry: DeploymentLogEntry,
    },
    Status {
        deployment_id: String,
        status: String,
        message: Option<String>,
    },
}

/// Producer handle; cheap to clone
#[derive(Clone)]
pub struct LogRelay {
    tx: mpsc::Sender<RelayEvent>,
}

impl LogRelay {
    /// Queue one deployment log line; drops on a full queue
    pub fn send_log(&self, deployment_id: &str, message: &str, level: &str, step: &str) {
        let event = RelayEvent::Log {
            deployment_id: deployment_id.to_string(),
            entry: DeploymentLogEntry {
                message: message.to_string(),
                level: level.to_string(),
                timestamp: Utc::now(),
                step: step.to_string(),
            },
        };
        if let Err(e) = self.tx.try_send(event) {
            debug!("Relay queue full, dropping log line: {}", e);
        }
    }

    /// Queue a deployment status transition; drops on a full queue
    pub fn update_status(&self, deployment_id: &str, status: &str, message: Option<&str>) {
        let event = RelayEvent::Status {
            deployment_id: deployment_id.to_string(),
            status: status.to_string(),
            message: message.map(str::to_string),
        };
        if let Err(e) = self.tx.try_send(event) {
            debug!("Relay queue full, dropping status update: {}", e);
        }
    }
}

/// Create a relay handle and its queue
pub fn channel(capacity: usize) -> (LogRelay, mpsc::Receiver<RelayEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (LogRelay { tx }, rx)
}

/// Run the relay worker: drain the queue, deliver best-effort
pub async fn run(
    mut rx: mpsc::Receiver<RelayEvent>,
    client: Arc<ControlPlaneClient>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Log relay worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                // Drain whatever is already queued, then stop.
                rx.close();
                while let Some(event) = rx.recv().await {
                    deliver(&client, event).await;
                }
                info!("Log relay worker shutting down...");
                return;
            }
            maybe_event = rx.recv() => match maybe_event {
                Some(event) => deliver(&client, event).await,
                None => {
                    info!("Log relay queue closed, worker stopping");
                    return;
                }
            }
        }
    }
}

async fn deliver(client: &ControlPlaneClient, event: RelayEvent) {
    match event {
        RelayEvent::Log {
            deployment_id,
            entry,
        } => {
            if let Err(e) = client.send_deployment_log(&deployment_id, &entry).await {
                debug!("Dropped log line for deployment {}: {}", deployment_id, e);
            }
        }
        RelayEvent::Status {
            deployment_id,
            status,
            message,
        } => {
            if let Err(e) = client
                .update_deployment_status(&deployment_id, &status, message.as_deref())
                .await
            {
                debug!(
                    "Dropped status update for deployment {}: {}",
                    deployment_id, e
                );
            }
        }
    }
}
