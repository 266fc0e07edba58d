//! Operator endpoints on a separate listener.
//!
//! All routes require `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::AppState;
use crate::store::MemoryStore;

#[derive(Clone)]
pub struct AdminState {
    pub app: AppState,
    pub store: Arc<MemoryStore>,
}

pub fn setup_admin_router(state: AdminState, api_key: &str) -> Router {
    let api_key: Arc<str> = Arc::from(api_key);
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/hub", get(get_hub))
        .route("/admin/cache", get(get_cache))
        .route(
            "/admin/cache/projects/{prefix}/invalidate",
            post(invalidate_project),
        )
        .route(
            "/admin/cache/rules/{project_id}/invalidate",
            post(invalidate_rules),
        )
        .route("/admin/store/reload", post(reload_store))
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::config::GatewayConfig;
    use crate::hub::Hub;
    use crate::lifecycle::Shutdown;

    const SEED: &str = r#"
[[projects]]
id = "p-a"
name = "Project A"
path_prefix = "/proj-a"
upstream_url = "http://127.0.0.1:1"
"#;

    fn admin() -> (Router, AdminState, Shutdown) {
        let config = GatewayConfig::default();
        let store = Arc::new(MemoryStore::from_toml(SEED).unwrap());
        let shutdown = Shutdown::new();
        let (hub, handle) = Hub::new(&config.hub);
        tokio::spawn(hub.run(shutdown.subscribe()));
        let app = AppState::new(&config, store.clone(), handle).unwrap();
        let state = AdminState { app, store };
        (setup_admin_router(state.clone(), "secret"), state, shutdown)
    }

    fn request(method: &str, uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("authorization", format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_key() {
        let (router, _, _shutdown) = admin();
        let none = router
            .clone()
            .oneshot(request("GET", "/admin/status", None))
            .await
            .unwrap();
        assert_eq!(none.status(), StatusCode::UNAUTHORIZED);

        let wrong = router
            .oneshot(request("GET", "/admin/status", Some("nope")))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_reports_project_count() {
        let (router, _, _shutdown) = admin();
        let response = router
            .oneshot(request("GET", "/admin/status", Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["status"], "operational");
        assert_eq!(body["projects"], 1);
    }

    #[tokio::test]
    async fn hub_stats_start_empty() {
        let (router, _, _shutdown) = admin();
        let response = router
            .oneshot(request("GET", "/admin/hub", Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!({ "projects": {} }));
    }

    #[tokio::test]
    async fn invalidation_normalises_prefix() {
        let (router, state, _shutdown) = admin();
        state
            .app
            .dispatcher
            .dispatch(
                &crate::dispatch::RequestContext::new("r", [10, 0, 0, 1].into()),
                Request::get("/proj-a/x").body(Body::empty()).unwrap(),
            )
            .await;
        assert_eq!(state.app.dispatcher.cache_stats().projects, 1);

        let response = router
            .oneshot(request(
                "POST",
                "/admin/cache/projects/proj-a/invalidate",
                Some("secret"),
            ))
            .await
            .unwrap();
        let body = json(response).await;
        assert_eq!(body["key"], "/proj-a");
        assert_eq!(body["invalidated"], true);
        assert_eq!(state.app.dispatcher.cache_stats().projects, 0);
    }

    #[tokio::test]
    async fn reload_without_seed_file_fails_cleanly() {
        let (router, _, _shutdown) = admin();
        let response = router
            .oneshot(request("POST", "/admin/store/reload", Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await["error"], "reload_failed");
    }
}
