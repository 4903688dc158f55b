//! HTTP router configuration.
//!
//! This module provides functions to build the Axum router with all
//! necessary routes and middleware.

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin::{AdminState, build_admin_router};
use crate::handler::{
    health_check, history, init_runtime, language_history, list_runtimes, readiness_check,
    run_code,
};
use crate::state::AppState;

/// Admin API configuration for router.
#[derive(Debug, Clone)]
pub struct AdminRouterConfig {
    /// Admin API prefix (e.g., "/admin").
    pub prefix: String,
    /// Admin authentication token.
    pub token: String,
}

/// Build the main application router.
///
/// Routes:
/// - `POST /run` - Run a snippet
/// - `GET /runtimes` - Status of every runtime
/// - `POST /runtimes/:language/init` - Boot one runtime
/// - `GET /history` - Execution history
/// - `GET /history/:language` - Execution history of one language
/// - `GET /health` - Health check
/// - `GET /ready` - Readiness check
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    build_router_with_admin(state, request_timeout, None)
}

/// Build the main application router with optional Admin API.
pub fn build_router_with_admin(
    state: AppState,
    request_timeout: Duration,
    admin_config: Option<AdminRouterConfig>,
) -> Router {
    let runtime_routes = Router::new()
        .route("/run", post(run_code))
        .route("/runtimes", get(list_runtimes))
        .route("/runtimes/:language/init", post(init_runtime))
        .route("/history", get(history))
        .route("/history/:language", get(language_history));

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check));

    let mut router = Router::new().merge(runtime_routes).merge(health_routes);

    if let Some(config) = admin_config {
        let admin_state = AdminState {
            app_state: state.clone(),
            admin_token: config.token,
        };
        router = router.nest(&config.prefix, build_admin_router(admin_state));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use polyglot_common::{Language, RuntimeError};
    use polyglot_core::{BackendFactory, LanguageBackend, OutputSink, RuntimeManager};
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::*;

    struct EchoBackend(Language);

    #[async_trait]
    impl LanguageBackend for EchoBackend {
        fn language(&self) -> Language {
            self.0
        }

        async fn boot(&mut self) -> Result<String, RuntimeError> {
            Ok("echo 1.0".into())
        }

        async fn execute(&mut self, code: &str, _sink: &OutputSink) -> Result<String, RuntimeError> {
            Ok(code.to_string())
        }

        async fn install(&mut self, package: &str) -> Result<String, RuntimeError> {
            Ok(format!("installed {package}"))
        }
    }

    struct EchoFactory;

    impl BackendFactory for EchoFactory {
        fn create(&self, language: Language) -> Result<Box<dyn LanguageBackend>, RuntimeError> {
            Ok(Box::new(EchoBackend(language)))
        }
    }

    fn setup_router() -> Router {
        let manager = RuntimeManager::new(Arc::new(EchoFactory));
        let state = AppState::from_manager(Arc::new(manager));
        build_router_with_admin(
            state,
            Duration::from_secs(30),
            Some(AdminRouterConfig {
                prefix: "/admin".into(),
                token: "secret".into(),
            }),
        )
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("X-Admin-Token", "secret")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_router();
        let (status, _) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_check() {
        let app = setup_router();
        let (status, body) = send(&app, get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["runtimes_total"], 4);
    }

    #[tokio::test]
    async fn test_run_and_history() {
        let app = setup_router();

        let (status, body) = send(
            &app,
            json(
                "POST",
                "/run",
                &serde_json::json!({"code": "print('hi')", "language": "py"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["output"], "print('hi')");
        assert_eq!(body["language"], "python");

        let (_, history) = send(&app, get("/history")).await;
        assert_eq!(history.as_array().unwrap().len(), 1);

        let (_, history) = send(&app, get("/history/wat")).await;
        assert!(history.as_array().unwrap().is_empty());

        let (_, runtimes) = send(&app, get("/runtimes")).await;
        assert_eq!(runtimes["python"]["isReady"], true);
        assert_eq!(runtimes["cpp"]["isReady"], false);
    }

    #[tokio::test]
    async fn test_run_unknown_language() {
        let app = setup_router();

        let (status, body) = send(
            &app,
            json(
                "POST",
                "/run",
                &serde_json::json!({"code": "x", "language": "cobol"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unknown language: cobol");
    }

    #[tokio::test]
    async fn test_init_runtime() {
        let app = setup_router();

        let request = Request::builder()
            .method("POST")
            .uri("/runtimes/wat/init")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["version"], "echo 1.0");
    }

    #[tokio::test]
    async fn test_admin_requires_token() {
        let app = setup_router();

        let request = Request::builder()
            .method("DELETE")
            .uri("/admin/history")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_install_package() {
        let app = setup_router();

        let (status, body) = send(
            &app,
            json("POST", "/admin/packages", &serde_json::json!({"name": "numpy"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "installed numpy");

        let (status, _) = send(
            &app,
            json(
                "POST",
                "/admin/packages",
                &serde_json::json!({"name": "boost", "language": "cpp"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_preload_and_cleanup() {
        let app = setup_router();

        let (status, body) = send(
            &app,
            json("POST", "/admin/runtimes/preload", &Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["javascript"]["isReady"], true);

        let (status, _) = send(&app, json("DELETE", "/admin/runtimes/js", &Value::Null)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, runtimes) = send(&app, get("/runtimes")).await;
        assert_eq!(runtimes["javascript"]["isReady"], false);
        assert_eq!(runtimes["python"]["isReady"], true);
    }
}
