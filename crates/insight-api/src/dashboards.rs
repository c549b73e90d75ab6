use axum::{
    Extension, Json,
    body::to_bytes,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use http_body_util::LengthLimitError;
use tracing::info;
use uuid::Uuid;

use insight_types::api::{ChartTypeResponse, Claims, CsvUpdateResponse, DashboardView, ProjectSummary};

use crate::aggregate;
use crate::auth::AppState;
use crate::{blocking, parse_dashboard_id};
use crate::error::ApiError;
use crate::forms::{Action, RawSubmission};
use crate::render::resolve_render_context;

/// Header that switches `POST /dashboard/{id}` to a raw CSV overwrite.
const ACTION_HEADER: &str = "x-action";

pub async fn chart_types(State(state): State<AppState>) -> Result<Json<Vec<ChartTypeResponse>>, ApiError> {
    let types = blocking(move || Ok(state.db.list_chart_types()?)).await?;
    Ok(Json(
        types
            .into_iter()
            .map(|t| ChartTypeResponse { id: t.id, name: t.name })
            .collect(),
    ))
}

/// The caller's dashboards, newest first, each with its chart preview.
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    let user_id = claims.sub.to_string();
    let projects = blocking(move || {
        let dashboards = state.db.list_dashboards_for_user(&user_id)?;
        dashboards
            .into_iter()
            .map(|d| {
                let ctx = resolve_render_context(&state.db, state.store.as_ref(), d)?;
                Ok(ProjectSummary {
                    dashboard: ctx.dashboard_info(),
                    chart: ctx.chart_preview(),
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await?;

    Ok(Json(projects))
}

pub async fn create_dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Redirect, ApiError> {
    let user_id = claims.sub.to_string();
    let dashboard = blocking(move || aggregate::create_dashboard(&state.db, &user_id)).await?;
    Ok(Redirect::to(&format!("/dashboard/{}", dashboard.id)))
}

pub async fn show_dashboard(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DashboardView>, ApiError> {
    let id = parse_dashboard_id(&id)?;
    let view = blocking(move || {
        let dashboard = state
            .db
            .get_owned_dashboard(&id.to_string(), &claims.sub.to_string())?
            .ok_or(ApiError::NotFound)?;
        Ok(resolve_render_context(&state.db, state.store.as_ref(), dashboard)?.into_view())
    })
    .await?;

    Ok(Json(view))
}

/// Form submission of the dashboard page, or a raw CSV overwrite from the
/// spreadsheet editor when `X-Action: data` is set.
pub async fn submit_dashboard(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    req: Request,
) -> Result<Response, ApiError> {
    let id = parse_dashboard_id(&id)?;
    if is_csv_overwrite(req.headers()) {
        return overwrite_csv(state, id, claims, req).await;
    }

    let multipart = Multipart::from_request(req, &state)
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let raw = RawSubmission::read(multipart, state.max_upload_bytes).await?;

    let (dashboard_id, user_id) = (id.to_string(), claims.sub.to_string());
    let action = blocking(move || {
        if state.db.get_owned_dashboard(&dashboard_id, &user_id)?.is_none() {
            return Err(ApiError::NotFound);
        }
        let chart_types: Vec<String> = state.db.list_chart_types()?.into_iter().map(|t| t.name).collect();
        let sub = raw.validate(&chart_types)?;
        let store = state.store.as_ref();

        match sub.action {
            Action::Chart => {
                let chart_type = sub
                    .chart_type
                    .as_deref()
                    .ok_or_else(|| ApiError::field("chart_type", "This field is required."))?;
                aggregate::apply_chart_action(&state.db, store, &user_id, &dashboard_id, &sub.changes, chart_type, &sub.file)?;
            }
            Action::Data => {
                aggregate::apply_data_action(&state.db, store, &user_id, &dashboard_id, &sub.changes, &sub.file, &sub.axes)?;
            }
        }
        Ok(sub.action)
    })
    .await?;

    info!("Dashboard {} updated ({:?} action)", id, action);
    Ok(Redirect::to(&format!("/dashboard/{}", id)).into_response())
}

fn is_csv_overwrite(headers: &HeaderMap) -> bool {
    headers
        .get(ACTION_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("data"))
}

async fn overwrite_csv(state: AppState, id: Uuid, claims: Claims, req: Request) -> Result<Response, ApiError> {
    let limit = state.max_upload_bytes;
    let body = to_bytes(req.into_body(), limit).await.map_err(|e| {
        if e.into_inner().is::<LengthLimitError>() {
            ApiError::PayloadTooLarge(limit)
        } else {
            ApiError::BadRequest("Failed to read request body".into())
        }
    })?;

    let user_id = claims.sub.to_string();
    let found = blocking(move || {
        aggregate::overwrite_csv(&state.db, state.store.as_ref(), &user_id, &id.to_string(), &body)
    })
    .await?;

    let response = if found {
        Json(CsvUpdateResponse {
            success: true,
            error: None,
        })
        .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(CsvUpdateResponse {
                success: false,
                error: Some("No dataset found.".into()),
            }),
        )
            .into_response()
    };
    Ok(response)
}

pub async fn delete_dashboard(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Redirect, ApiError> {
    let id = parse_dashboard_id(&id)?;
    blocking(move || {
        aggregate::delete_dashboard(&state.db, state.store.as_ref(), &claims.sub.to_string(), &id.to_string())
    })
    .await?;

    Ok(Redirect::to("/projects"))
}
