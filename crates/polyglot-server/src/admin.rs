//! Admin API handlers for runtime management.
//!
//! # Authentication
//!
//! All Admin API endpoints require the `X-Admin-Token` header
//! to match the configured admin token.
//!
//! # Endpoints
//!
//! - `POST /admin/runtimes/preload` - Boot every runtime
//! - `DELETE /admin/runtimes` - Tear down every runtime and clear history
//! - `DELETE /admin/runtimes/:language` - Tear down one runtime
//! - `DELETE /admin/history` - Clear the execution history
//! - `POST /admin/packages` - Install a package

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, post},
};
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};

use crate::request::{InstallRequest, parse_language};
use crate::response::ApiError;
use crate::state::AppState;

/// Admin API state containing app state and auth token.
#[derive(Clone)]
pub struct AdminState {
    /// Application state.
    pub app_state: AppState,
    /// Expected admin token for authentication.
    pub admin_token: String,
}

/// Build the Admin API router.
///
/// Returns a router that uses Extension to pass the admin state,
/// allowing it to be nested into routers with different state types.
pub fn build_admin_router(admin_state: AdminState) -> Router<AppState> {
    Router::new()
        .route("/runtimes/preload", post(preload_runtimes))
        .route("/runtimes", delete(cleanup_runtimes))
        .route("/runtimes/:language", delete(cleanup_runtime))
        .route("/history", delete(clear_history))
        .route("/packages", post(install_package))
        .layer(Extension(admin_state))
}

/// Verify the admin token from request headers.
fn verify_token(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let Some(token) = headers.get("X-Admin-Token") else {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "Missing X-Admin-Token header",
        ));
    };

    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        warn!("Rejected admin request with invalid token");
        Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid admin token"))
    }
}

/// Boot every runtime and wait until all have settled.
///
/// Individual failures do not fail the request; they show up in the
/// returned status snapshot.
#[instrument(skip(admin_state, headers))]
pub async fn preload_runtimes(
    Extension(admin_state): Extension<AdminState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    verify_token(&headers, &admin_state.admin_token)?;

    let manager = admin_state.app_state.manager();
    manager.preload_all_runtimes().await;

    Ok(Json(manager.get_runtime_status()))
}

/// Tear down one runtime.
#[instrument(skip(admin_state, headers))]
pub async fn cleanup_runtime(
    Extension(admin_state): Extension<AdminState>,
    headers: HeaderMap,
    Path(language): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    verify_token(&headers, &admin_state.admin_token)?;

    let language = parse_language(&language)?;
    admin_state.app_state.manager().cleanup_language(language).await;
    info!(%language, "Runtime cleaned up via admin API");

    Ok(Json(serde_json::json!({
        "language": language,
        "message": "Runtime cleaned up",
    })))
}

/// Tear down every runtime and clear the history.
#[instrument(skip(admin_state, headers))]
pub async fn cleanup_runtimes(
    Extension(admin_state): Extension<AdminState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    verify_token(&headers, &admin_state.admin_token)?;

    admin_state.app_state.manager().cleanup().await;
    info!("All runtimes cleaned up via admin API");

    Ok(Json(serde_json::json!({ "message": "All runtimes cleaned up" })))
}

/// Clear the execution history.
#[instrument(skip(admin_state, headers))]
pub async fn clear_history(
    Extension(admin_state): Extension<AdminState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    verify_token(&headers, &admin_state.admin_token)?;

    admin_state.app_state.manager().clear_execution_history();

    Ok(StatusCode::NO_CONTENT)
}

/// Install a package into a runtime.
///
/// `POST /admin/packages` with `{"name": "numpy", "language": "python"}`.
#[instrument(skip(admin_state, headers, request), fields(package = %request.name))]
pub async fn install_package(
    Extension(admin_state): Extension<AdminState>,
    headers: HeaderMap,
    Json(request): Json<InstallRequest>,
) -> Result<impl IntoResponse, ApiError> {
    verify_token(&headers, &admin_state.admin_token)?;

    let language = request.language()?;
    let output = admin_state
        .app_state
        .manager()
        .install_package(language, &request.name)
        .await?;
    info!(%language, package = %request.name, "Package installed via admin API");

    Ok(Json(serde_json::json!({
        "language": language,
        "name": request.name,
        "output": output,
    })))
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn test_verify_token_valid() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Admin-Token", "secret".parse().unwrap());

        assert_ok!(verify_token(&headers, "secret"));
    }

    #[test]
    fn test_verify_token_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Admin-Token", "wrong".parse().unwrap());

        let err = assert_err!(verify_token(&headers, "secret"));
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_verify_token_prefix_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Admin-Token", "secre".parse().unwrap());

        assert_err!(verify_token(&headers, "secret"));
    }

    #[test]
    fn test_verify_token_missing() {
        let err = verify_token(&HeaderMap::new(), "secret").unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Missing X-Admin-Token header");
    }
}
