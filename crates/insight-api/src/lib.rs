//! HTTP API of InsightHub: auth, dashboards, the public gallery and social
//! interactions.

pub mod aggregate;
pub mod auth;
pub mod dashboards;
pub mod error;
pub mod forms;
pub mod middleware;
pub mod public;
pub mod render;
pub mod social;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tracing::error;
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::ApiError;

/// Room for the text fields that travel with an upload.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Runs blocking database and file store work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })?
}

/// Dashboard id from a path segment. Anything that is not a UUID cannot name
/// a dashboard and is reported as missing.
pub(crate) fn parse_dashboard_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse().map_err(|_| ApiError::NotFound)
}

/// All routes, with state applied. The binary adds CORS and tracing layers.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES);

    let public_routes = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/chart-types", get(dashboards::chart_types))
        .route("/publicProjects/{id}", get(public::show_public));

    let protected_routes = Router::new()
        .route("/projects", get(dashboards::list_projects))
        .route("/dashboard/create", post(dashboards::create_dashboard))
        .route(
            "/dashboard/{id}",
            get(dashboards::show_dashboard).post(dashboards::submit_dashboard),
        )
        .route("/dashboard/{id}/delete", post(dashboards::delete_dashboard))
        .route("/publicProjects", get(public::list_public))
        .route("/publicProjects/{id}/like", post(social::toggle_like))
        .route("/publicProjects/{id}/comment", post(social::add_comment))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
