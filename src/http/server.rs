//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: log stream route plus catch-all proxy route
//! - Wire up middleware (tracing, request ID, identity)
//! - Build the per-request context and hand off to the dispatch pipeline
//! - Serve with connect info and graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware,
    response::Response,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{GatewayConfig, HubConfig};
use crate::dispatch::{Dispatcher, RequestContext};
use crate::http::request::{request_id, request_id_layers};
use crate::http::websocket;
use crate::hub::HubHandle;
use crate::observability::EventEmitter;
use crate::security::{identity_middleware, Identity, StaticTokenProvider};
use crate::store::ProjectStore;
use crate::upstream::{ForwardError, ForwarderFactory};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub hub: HubHandle,
    pub hub_config: Arc<HubConfig>,
}

impl AppState {
    /// Assemble the pipeline over `store`, reporting events to `hub`.
    pub fn new(
        config: &GatewayConfig,
        store: Arc<dyn ProjectStore>,
        hub: HubHandle,
    ) -> Result<Self, ForwardError> {
        let forwarders = ForwarderFactory::new(&config.upstream)?;
        let events = EventEmitter::with_hub(hub.clone());
        let dispatcher = Dispatcher::new(
            store,
            forwarders,
            events,
            config.firewall.unknown_rule_policy,
        );
        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            hub,
            hub_config: Arc::new(config.hub.clone()),
        })
    }
}

/// The tenant-facing HTTP server.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let identity = StaticTokenProvider::from_config(&config.auth.tokens);
        let (set_request_id, propagate_request_id) = request_id_layers();

        Router::new()
            .route(&config.hub.logs_route(), get(websocket::logs_handler))
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(identity, identity_middleware))
            .layer(propagate_request_id)
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id)
    }

    /// The router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` completes.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Catch-all handler: every non-log-stream request goes through the pipeline.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let identity = request.extensions().get::<Identity>().cloned();
    let ctx = RequestContext::new(request_id(&request), peer.ip()).with_identity(identity);

    tracing::debug!(
        request_id = %ctx.request_id,
        method = %request.method(),
        path = %request.uri().path(),
        "Dispatching request"
    );

    state.dispatcher.dispatch(&ctx, request).await
}
