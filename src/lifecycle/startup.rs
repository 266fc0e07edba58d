//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the project store
//! - Start the hub and the store watcher
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::http::{AppState, GatewayServer};
use crate::hub::Hub;
use crate::lifecycle::Shutdown;
use crate::store::{MemoryStore, StoreError, StoreWatcher};
use crate::upstream::ForwardError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load project store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to build upstream client: {0}")]
    Upstream(#[from] ForwardError),

    #[error("failed to watch store file: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
}

/// Handles to a started gateway.
pub struct RunningGateway {
    pub gateway_addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    pub state: AppState,
    tasks: Vec<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

impl RunningGateway {
    /// Wait for every task to finish after shutdown was triggered.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Task ended abnormally");
            }
        }
    }
}

/// Start every subsystem described by `config`.
pub async fn start(config: GatewayConfig, shutdown: &Shutdown) -> Result<RunningGateway, StartupError> {
    let mut tasks = Vec::new();

    let store = Arc::new(MemoryStore::load(Path::new(&config.store.path))?);

    let (hub, hub_handle) = Hub::new(&config.hub);
    tasks.push(tokio::spawn(hub.run(shutdown.subscribe())));

    let state = AppState::new(&config, store.clone(), hub_handle)?;

    let watcher = if config.store.watch {
        match StoreWatcher::new(store.clone()) {
            Some((watcher, changes)) => {
                let watcher = watcher.run()?;
                tasks.push(tokio::spawn(apply_store_changes(
                    changes,
                    state.dispatcher.clone(),
                    shutdown.subscribe(),
                )));
                Some(watcher)
            }
            None => None,
        }
    } else {
        None
    };

    let listener = bind(&config.listener.bind_address).await?;
    let gateway_addr = local_addr(&listener, &config.listener.bind_address)?;
    let server = GatewayServer::new(&config, state.clone());
    let server_shutdown = shutdown.signalled();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = server.run(listener, server_shutdown).await {
            tracing::error!(error = %e, "Gateway server failed");
        }
    }));

    let admin_addr = if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        let addr = local_addr(&listener, &config.admin.bind_address)?;
        let router = setup_admin_router(
            AdminState {
                app: state.clone(),
                store,
            },
            &config.admin.api_key,
        );
        let admin_shutdown = shutdown.signalled();
        tasks.push(tokio::spawn(async move {
            tracing::info!(address = %addr, "Admin API listening");
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(admin_shutdown)
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin server failed");
            }
        }));
        Some(addr)
    } else {
        None
    };

    Ok(RunningGateway {
        gateway_addr,
        admin_addr,
        state,
        tasks,
        _watcher: watcher,
    })
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

fn local_addr(listener: &TcpListener, address: &str) -> Result<SocketAddr, StartupError> {
    listener.local_addr().map_err(|source| StartupError::Bind {
        address: address.to_string(),
        source,
    })
}

/// Clear the cache keys of every store reload until shutdown.
async fn apply_store_changes(
    mut changes: tokio::sync::mpsc::UnboundedReceiver<crate::store::StoreChange>,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            change = changes.recv() => match change {
                Some(change) => {
                    dispatcher.apply_change(&change);
                }
                None => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_store_file_fails_fast() {
        let mut config = GatewayConfig::default();
        config.store.path = "/nonexistent/projects.toml".into();

        let result = start(config, &Shutdown::new()).await;

        assert!(matches!(result, Err(StartupError::Store(_))));
    }

    #[tokio::test]
    async fn starts_and_stops_on_ephemeral_ports() {
        let seed = tempfile::NamedTempFile::new().unwrap();
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.admin.enabled = true;
        config.admin.api_key = "secret".into();
        config.admin.bind_address = "127.0.0.1:0".into();
        config.store.path = seed.path().to_string_lossy().into_owned();
        config.store.watch = false;

        let shutdown = Shutdown::new();
        let running = start(config, &shutdown).await.unwrap();
        assert_ne!(running.gateway_addr.port(), 0);
        assert!(running.admin_addr.is_some());

        shutdown.trigger();
        running.wait().await;
    }
}
