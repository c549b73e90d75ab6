use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AxisRole, Renderer, Visibility};

// -- JWT Claims --

/// JWT claims issued by the auth endpoints and checked by the API middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Dashboards --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardInfo {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a client needs to draw a dashboard's chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPreview {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub renderer: Renderer,
    pub chart_type: Option<String>,
    pub data: Vec<Vec<String>>,
    pub axis: BTreeMap<AxisRole, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub letter: String,
}

/// Owner view of a dashboard, including the prefill for the selection form.
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardView {
    pub dashboard: DashboardInfo,
    pub chart: ChartPreview,
    pub has_file: bool,
    pub columns: Vec<ColumnInfo>,
    pub axis_letter: BTreeMap<AxisRole, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub dashboard: DashboardInfo,
    pub chart: ChartPreview,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublicProjectSummary {
    pub dashboard: DashboardInfo,
    pub chart: ChartPreview,
    pub like_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChartTypeResponse {
    pub id: i64,
    pub name: String,
}

/// Reply to a raw CSV overwrite (`X-Action: data`).
#[derive(Debug, Serialize, Deserialize)]
pub struct CsvUpdateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -- Social --

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub author_username: Option<String>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublicDashboardView {
    pub dashboard: DashboardInfo,
    pub chart: ChartPreview,
    pub comments: Vec<CommentResponse>,
    pub like_count: i64,
    pub liked: bool,
}
