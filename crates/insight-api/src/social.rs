use axum::{
    Extension, Form, Json,
    extract::{Path, State},
    response::Redirect,
};
use tracing::info;
use uuid::Uuid;

use insight_types::api::{Claims, CommentRequest, LikeResponse};

use crate::auth::AppState;
use crate::{blocking, parse_dashboard_id};
use crate::error::ApiError;
use crate::forms::validate_comment;
use crate::public::visible_dashboard;

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<LikeResponse>, ApiError> {
    let id = parse_dashboard_id(&id)?;
    let user_id = claims.sub.to_string();
    let (liked, like_count) = blocking(move || {
        let dashboard = visible_dashboard(&state.db, &id.to_string(), Some(&user_id))?;
        let like_id = Uuid::new_v4().to_string();
        Ok(state.db.toggle_like(&like_id, &user_id, &dashboard.id)?)
    })
    .await?;

    Ok(Json(LikeResponse { liked, like_count }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(claims): Extension<Claims>,
    Form(req): Form<CommentRequest>,
) -> Result<Redirect, ApiError> {
    let id = parse_dashboard_id(&id)?;
    let body = validate_comment(&req.comment)?;

    let user_id = claims.sub.to_string();
    let comment = blocking(move || {
        let dashboard = visible_dashboard(&state.db, &id.to_string(), Some(&user_id))?;
        let comment_id = Uuid::new_v4().to_string();
        Ok(state.db.add_comment(&comment_id, &user_id, &dashboard.id, &body)?)
    })
    .await?;

    info!("Comment {} added to dashboard {} by {}", comment.id, id, claims.username);
    Ok(Redirect::to(&format!("/publicProjects/{}", id)))
}
