//! Polling worker: the command control loop
//!
//! Fetches pending commands every tick and admits them into the live-set up
//! to the concurrency ceiling. On shutdown the tick stops but in-flight
//! handlers drain to completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::app::state::{Admission, AppState};
use crate::dispatch;
use crate::models::command::CommandStatus;

/// Control loop options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

/// Run the control loop
pub async fn run<S, F>(
    options: &Options,
    state: Arc<AppState>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Control loop starting...");

    let mut handlers: JoinSet<()> = JoinSet::new();
    let mut first_tick = true;

    loop {
        // The first tick runs immediately on startup.
        if first_tick {
            first_tick = false;
        } else {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    break;
                }
                _ = sleep_fn(options.interval) => {}
            }
        }

        // Reap finished handler tasks.
        while handlers.try_join_next().is_some() {}

        let commands = match state.client.pending_commands().await {
            Ok(commands) => commands,
            Err(e) => {
                warn!("Failed to poll for commands: {}", e);
                continue;
            }
        };

        if !commands.is_empty() {
            debug!("Poll returned {} command(s)", commands.len());
        }

        for command in commands {
            if command.status != CommandStatus::Pending {
                continue;
            }

            match state.tracker.admit(&command.id) {
                Admission::Duplicate => continue,
                Admission::Full => {
                    // Ceiling reached; the next tick re-examines the rest.
                    debug!("Live-set at ceiling, deferring remaining commands");
                    break;
                }
                Admission::Admitted => {
                    let state = state.clone();
                    handlers.spawn(async move {
                        let id = command.id.clone();
                        dispatch::execute(&state, command).await;
                        state.tracker.release(&id);
                    });
                }
            }
        }
    }

    if !handlers.is_empty() {
        info!(
            "Control loop draining {} in-flight command(s)...",
            handlers.len()
        );
    }
    while handlers.join_next().await.is_some() {}

    info!("Control loop shutting down...");
}
