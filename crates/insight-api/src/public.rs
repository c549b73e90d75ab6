use axum::{
    Extension, Json,
    extract::{Path, State},
    http::HeaderMap,
};

use insight_db::Database;
use insight_db::models::{CommentRow, DashboardRow};
use insight_types::api::{Claims, CommentResponse, PublicDashboardView, PublicProjectSummary};

use crate::auth::AppState;
use crate::{blocking, parse_dashboard_id};
use crate::error::ApiError;
use crate::middleware::claims_from_headers;
use crate::render::{parse_id, parse_timestamp, resolve_render_context};

/// Public dashboards with like and comment counts.
pub async fn list_public(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Vec<PublicProjectSummary>>, ApiError> {
    let projects = blocking(move || {
        let rows = state.db.list_public_dashboards()?;
        rows.into_iter()
            .map(|row| {
                let ctx = resolve_render_context(&state.db, state.store.as_ref(), row.dashboard)?;
                Ok(PublicProjectSummary {
                    dashboard: ctx.dashboard_info(),
                    chart: ctx.chart_preview(),
                    like_count: row.like_count,
                    comment_count: row.comment_count,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()
    })
    .await?;

    Ok(Json(projects))
}

/// A single dashboard as seen by visitors. Anonymous callers are allowed;
/// a valid token adds the viewer's like state.
pub async fn show_public(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PublicDashboardView>, ApiError> {
    let id = parse_dashboard_id(&id)?;
    let viewer = claims_from_headers(&headers, &state.jwt_secret).map(|c| c.sub.to_string());

    let view = blocking(move || {
        let dashboard = visible_dashboard(&state.db, &id.to_string(), viewer.as_deref())?;
        let dashboard_id = dashboard.id.clone();

        let comments = state
            .db
            .list_comments(&dashboard_id)?
            .iter()
            .map(comment_response)
            .collect();
        let like_count = state.db.like_count(&dashboard_id)?;
        let liked = match &viewer {
            Some(user_id) => state.db.has_liked(user_id, &dashboard_id)?,
            None => false,
        };

        let ctx = resolve_render_context(&state.db, state.store.as_ref(), dashboard)?;
        Ok(PublicDashboardView {
            dashboard: ctx.dashboard_info(),
            chart: ctx.chart_preview(),
            comments,
            like_count,
            liked,
        })
    })
    .await?;

    Ok(Json(view))
}

/// A dashboard the viewer may see: public ones, or private ones they own.
/// Anything else is reported as missing.
pub(crate) fn visible_dashboard(db: &Database, id: &str, viewer: Option<&str>) -> Result<DashboardRow, ApiError> {
    let dashboard = db.get_dashboard(id)?.ok_or(ApiError::NotFound)?;
    let is_owner = viewer.is_some() && dashboard.user_id.as_deref() == viewer;
    if dashboard.is_private && !is_owner {
        return Err(ApiError::NotFound);
    }
    Ok(dashboard)
}

pub(crate) fn comment_response(row: &CommentRow) -> CommentResponse {
    CommentResponse {
        id: parse_id(&row.id),
        author_username: row.author_username.clone(),
        comment: row.body.clone(),
        created_at: parse_timestamp(&row.created_at, &row.id),
    }
}
