//! Resource report worker
//!
//! Periodically ships the full host + cluster + database snapshot to the
//! control plane. Failures are swallowed like every other periodic loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::app::state::AppState;
use crate::telemetry;

/// Resource report worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Report interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Run the resource report worker
pub async fn run<S, F>(
    options: &Options,
    state: Arc<AppState>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Resource report worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Resource report worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let snapshot = telemetry::collect_snapshot().await;
        match state.client.report_resources(&snapshot).await {
            Ok(()) => debug!(
                "Resource report sent ({} pods, {} databases)",
                snapshot.pod_count,
                snapshot.databases.len()
            ),
            Err(e) => debug!("Resource report delivery failed: {}", e),
        }
    }
}
