//! Heartbeat worker: periodic liveness, status, and resource report
//!
//! While the agent is degraded (no identity), each tick first re-attempts a
//! single registration. Delivery failures are swallowed; the heartbeat must
//! never take the agent down.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::app::state::AppState;
use crate::kube::driver;
use crate::models::agent::HeartbeatSnapshot;
use crate::telemetry;

/// Heartbeat worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Heartbeat interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Run the heartbeat worker
pub async fn run<S, F>(
    options: &Options,
    state: Arc<AppState>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Heartbeat worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                // One final heartbeat on the way out, best-effort.
                send_heartbeat(&state).await;
                info!("Heartbeat worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        if !state.is_registered() {
            if let Err(e) = state.register_once().await {
                debug!("Degraded re-registration failed: {}", e);
            }
        }

        send_heartbeat(&state).await;
    }
}

async fn send_heartbeat(state: &Arc<AppState>) {
    let snapshot = HeartbeatSnapshot {
        status: state.tracker.status(),
        resources: telemetry::collect_snapshot().await,
        running_pods: driver::running_pods().await,
        error_message: state.tracker.last_error(),
    };

    match state.client.heartbeat(&snapshot).await {
        Ok(()) => debug!("Heartbeat sent ({})", snapshot.status),
        Err(e) => debug!("Heartbeat delivery failed: {}", e),
    }
}
