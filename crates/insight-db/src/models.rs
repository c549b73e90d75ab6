//! Database row types. These map directly to SQLite rows and are kept
//! separate from the insight-types API models.

use insight_types::models::AxisRole;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct DashboardRow {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct DatasetRow {
    pub id: String,
    pub user_id: Option<String>,
    pub dashboard_id: Option<String>,
    pub file_handle: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct DatasetColumnRow {
    pub id: String,
    pub dataset_id: String,
    pub position: usize,
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone)]
pub struct ChartRow {
    pub id: String,
    pub dashboard_id: String,
    pub dataset_id: Option<String>,
    pub chart_type: Option<String>,
}

/// A selection joined with the column it points at.
#[derive(Debug, Clone)]
pub struct SelectionRow {
    pub chart_id: String,
    pub axis: AxisRole,
    pub column_id: String,
    pub column_name: String,
    pub column_position: usize,
}

pub struct ChartTypeRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: String,
    pub user_id: Option<String>,
    pub author_username: Option<String>,
    pub dashboard_id: Option<String>,
    pub body: String,
    pub created_at: String,
}

pub struct PublicDashboardRow {
    pub dashboard: DashboardRow,
    pub like_count: i64,
    pub comment_count: i64,
}
