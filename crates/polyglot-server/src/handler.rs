//! Request handlers for the public host API.
//!
//! Handlers are thin: they parse the language key, call the
//! [`RuntimeManager`](polyglot_core::RuntimeManager) and serialize the
//! result. Failed runs are still `200 OK` with `status: "error"` in the
//! execution record; only failures to reach a runtime map to error codes.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{info, instrument};

use polyglot_core::CodeExecution;

use crate::request::{RunRequest, parse_language};
use crate::response::ApiError;
use crate::state::AppState;

/// Run a snippet.
///
/// `POST /run` with `{"code": "...", "language": "python"}`.
#[instrument(skip(state, request), fields(language = %request.language))]
pub async fn run_code(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<CodeExecution>, ApiError> {
    let language = parse_language(&request.language)?;
    let execution = state.manager().run_code(&request.code, language).await?;

    info!(
        execution_id = %execution.id,
        status = ?execution.status,
        "Run request completed"
    );
    Ok(Json(execution))
}

/// Boot one runtime.
///
/// `POST /runtimes/:language/init`
#[instrument(skip(state))]
pub async fn init_runtime(
    State(state): State<AppState>,
    Path(language): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let language = parse_language(&language)?;
    state.manager().init_runtime(language).await?;

    let status = state
        .manager()
        .get_runtime_status()
        .remove(&language)
        .unwrap_or_default();
    Ok(Json(serde_json::json!({
        "language": language,
        "status": status,
    })))
}

/// Status snapshot of every runtime.
///
/// `GET /runtimes`
pub async fn list_runtimes(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager().get_runtime_status())
}

/// Execution history, newest first.
///
/// `GET /history`
pub async fn history(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager().get_execution_history())
}

/// Execution history of one language, newest first.
///
/// `GET /history/:language`
pub async fn language_history(
    State(state): State<AppState>,
    Path(language): Path<String>,
) -> Result<Json<Vec<CodeExecution>>, ApiError> {
    let language = parse_language(&language)?;
    Ok(Json(state.manager().get_language_execution_history(language)))
}

/// Health check handler.
///
/// Returns 200 OK if the server is running.
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness check handler.
///
/// The server accepts runs before any runtime is booted, so this is always
/// ready; the body reports which runtimes are already warm.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.manager().get_runtime_status();
    let ready: Vec<_> = status
        .iter()
        .filter(|(_, status)| status.is_ready)
        .map(|(language, _)| *language)
        .collect();

    let body = serde_json::json!({
        "status": "ready",
        "runtimes_ready": ready,
        "runtimes_total": status.len(),
    });

    (StatusCode::OK, Json(body))
}
