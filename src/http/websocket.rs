//! Live log stream for one project.
//!
//! # Responsibilities
//! - Admit or refuse the upgrade (origin allow-list, optional identity)
//! - Register the connection with the hub
//! - Run the read and write pumps until either ends, then unregister
//!
//! # Data Flow
//! ```text
//! Hub ──queue──▶ write pump ──text frames──▶ Client
//!                read pump  ◀──close/err──── Client
//! ```
//!
//! # Design Decisions
//! - Inbound messages carry no meaning; the read pump only notices disconnects
//! - Messages queued while a frame is being written go out as one
//!   newline-joined frame

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header::ORIGIN, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};

use crate::config::HubConfig;
use crate::http::server::AppState;
use crate::hub::{HubHandle, Subscription};
use crate::security::Identity;

/// Upgrade handler for `{api_prefix}/projects/{project_id}/logs`.
pub async fn logs_handler(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    identity: Option<Extension<Identity>>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Err(status) = admit(&state.hub_config, &headers, identity.is_some()) {
        tracing::warn!(project_id = %project_id, status = %status, "Log stream refused");
        return status.into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| serve_subscriber(socket, hub, project_id))
}

/// Origin and identity checks, before any upgrade work.
fn admit(config: &HubConfig, headers: &HeaderMap, identified: bool) -> Result<(), StatusCode> {
    if !config.allowed_origins.is_empty() {
        let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
        let allowed = origin.is_some_and(|o| config.allowed_origins.iter().any(|a| a == o));
        if !allowed {
            return Err(StatusCode::FORBIDDEN);
        }
    }
    if config.require_identity && !identified {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

async fn serve_subscriber(socket: WebSocket, hub: HubHandle, project_id: String) {
    let subscription = match hub.subscribe(&project_id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(project_id = %project_id, error = %e, "Could not register subscriber");
            return;
        }
    };
    let id = subscription.id;
    tracing::info!(subscriber = %id, project_id = %project_id, "Log stream opened");

    let (sink, stream) = socket.split();
    let mut write = tokio::spawn(write_pump(sink, subscription));
    let mut read = tokio::spawn(read_pump(stream));

    tokio::select! {
        _ = &mut write => read.abort(),
        _ = &mut read => write.abort(),
    }

    hub.unregister(&project_id, id).await;
    tracing::info!(subscriber = %id, project_id = %project_id, "Log stream closed");
}

async fn write_pump(mut sink: SplitSink<WebSocket, Message>, mut subscription: Subscription) {
    while let Some(frame) = subscription.next_frame().await {
        if sink.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }
    // Queue closed by the hub: evicted, unregistered or shutting down.
    let _ = sink.send(Message::Close(None)).await;
}

async fn read_pump(mut stream: SplitStream<WebSocket>) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(origins: &[&str], require_identity: bool) -> HubConfig {
        HubConfig {
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
            require_identity,
            ..HubConfig::default()
        }
    }

    fn origin(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn any_origin_when_list_empty() {
        assert_eq!(admit(&config(&[], false), &HeaderMap::new(), false), Ok(()));
    }

    #[test]
    fn origin_must_be_listed() {
        let config = config(&["http://localhost:5173"], false);
        assert_eq!(admit(&config, &origin("http://localhost:5173"), false), Ok(()));
        assert_eq!(
            admit(&config, &origin("http://evil.example"), false),
            Err(StatusCode::FORBIDDEN)
        );
        assert_eq!(
            admit(&config, &HeaderMap::new(), false),
            Err(StatusCode::FORBIDDEN)
        );
    }

    #[test]
    fn identity_required_when_configured() {
        let config = config(&[], true);
        assert_eq!(
            admit(&config, &HeaderMap::new(), false),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(admit(&config, &HeaderMap::new(), true), Ok(()));
    }
}
