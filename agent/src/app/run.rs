//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::AppOptions;
use crate::app::state::{AppState, CommandTracker};
use crate::errors::AgentError;
use crate::http::client::ControlPlaneClient;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::{heartbeat, poller, relay, resources};

/// Run the DeployPilot agent
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError> {
    info!("Initializing DeployPilot agent...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), &options);

    // Initialize state and workers
    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start agent: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    // Wait for the shutdown signal
    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), AgentError> {
    let client = Arc::new(ControlPlaneClient::new(
        &options.backend_url,
        &options.server_token,
    )?);
    let tracker = Arc::new(CommandTracker::new(options.max_concurrent_commands));
    let (relay_handle, relay_rx) = relay::channel(options.relay_capacity);

    let app_state = Arc::new(AppState::new(client.clone(), tracker, relay_handle));

    // Register with the control plane. Exhausted backoff leaves the agent
    // degraded; the heartbeat loop keeps re-attempting registration.
    let request = app_state.registration_request().await;
    match client.register_with_backoff(&request).await {
        Ok(identity) => app_state.set_identity(identity),
        Err(e) => warn!("Continuing degraded: {}", e),
    }

    init_relay_worker(relay_rx, client, shutdown_manager, shutdown_tx.subscribe())?;
    init_poller_worker(
        options.poller.clone(),
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;
    init_heartbeat_worker(
        options.heartbeat.clone(),
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;
    init_resources_worker(
        options.resources.clone(),
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;
    init_http_server(options, app_state, shutdown_manager, shutdown_tx.subscribe()).await?;

    Ok(())
}

fn init_relay_worker(
    relay_rx: tokio::sync::mpsc::Receiver<relay::RelayEvent>,
    client: Arc<ControlPlaneClient>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing log relay worker...");

    let relay_handle = tokio::spawn(async move {
        relay::run(
            relay_rx,
            client,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_relay_worker_handle(relay_handle)
}

fn init_poller_worker(
    options: poller::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing control loop...");

    let poller_handle = tokio::spawn(async move {
        poller::run(
            &options,
            app_state,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_poller_worker_handle(poller_handle)
}

fn init_heartbeat_worker(
    options: heartbeat::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing heartbeat worker...");

    let heartbeat_handle = tokio::spawn(async move {
        heartbeat::run(
            &options,
            app_state,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_heartbeat_worker_handle(heartbeat_handle)
}

fn init_resources_worker(
    options: resources::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing resource report worker...");

    let resources_handle = tokio::spawn(async move {
        resources::run(
            &options,
            app_state,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_resources_worker_handle(resources_handle)
}

async fn init_http_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), AgentError> {
    info!("Initializing local HTTP server...");

    let server_state = Arc::new(ServerState::new(app_state));

    let server_handle = serve(&options.server, server_state, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_http_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    max_shutdown_delay: std::time::Duration,
    poller_worker_handle: Option<JoinHandle<()>>,
    heartbeat_worker_handle: Option<JoinHandle<()>>,
    resources_worker_handle: Option<JoinHandle<()>>,
    relay_worker_handle: Option<JoinHandle<()>>,
    http_server_handle: Option<JoinHandle<Result<(), AgentError>>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, options: &AppOptions) -> Self {
        Self {
            shutdown_tx,
            max_shutdown_delay: options.max_shutdown_delay,
            poller_worker_handle: None,
            heartbeat_worker_handle: None,
            resources_worker_handle: None,
            relay_worker_handle: None,
            http_server_handle: None,
        }
    }

    fn with_poller_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), AgentError> {
        if self.poller_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("poller_handle already set".to_string()));
        }
        self.poller_worker_handle = Some(handle);
        Ok(())
    }

    fn with_heartbeat_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), AgentError> {
        if self.heartbeat_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("heartbeat_handle already set".to_string()));
        }
        self.heartbeat_worker_handle = Some(handle);
        Ok(())
    }

    fn with_resources_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), AgentError> {
        if self.resources_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("resources_handle already set".to_string()));
        }
        self.resources_worker_handle = Some(handle);
        Ok(())
    }

    fn with_relay_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), AgentError> {
        if self.relay_worker_handle.is_some() {
            return Err(AgentError::ShutdownError("relay_handle already set".to_string()));
        }
        self.relay_worker_handle = Some(handle);
        Ok(())
    }

    fn with_http_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), AgentError>>,
    ) -> Result<(), AgentError> {
        if self.http_server_handle.is_some() {
            return Err(AgentError::ShutdownError("server_handle already set".to_string()));
        }
        self.http_server_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), AgentError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(self.max_shutdown_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), AgentError> {
        info!("Shutting down DeployPilot agent...");

        // 1. Control loop: stops ticking, drains in-flight handlers.
        if let Some(handle) = self.poller_worker_handle.take() {
            handle.await.map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        // 2. Heartbeat worker: records a final heartbeat on the way out.
        if let Some(handle) = self.heartbeat_worker_handle.take() {
            handle.await.map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        // 3. Resource report worker.
        if let Some(handle) = self.resources_worker_handle.take() {
            handle.await.map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        // 4. Log relay: drains whatever the handlers queued.
        if let Some(handle) = self.relay_worker_handle.take() {
            handle.await.map_err(|e| AgentError::ShutdownError(e.to_string()))?;
        }

        // 5. HTTP server.
        if let Some(handle) = self.http_server_handle.take() {
            handle.await.map_err(|e| AgentError::ShutdownError(e.to_string()))??;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
