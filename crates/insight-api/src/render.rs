//! Read side of a dashboard: everything a client needs to draw its chart.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use insight_dataset::storage::{FileHandle, FileStore};
use insight_dataset::{DatasetError, columns, csv_file};
use insight_db::Database;
use insight_db::models::{DashboardRow, DatasetColumnRow};
use insight_types::api::{ChartPreview, ColumnInfo, DashboardInfo, DashboardView};
use insight_types::models::{AxisRole, Renderer, Visibility};

use crate::error::ApiError;

/// A dashboard with every optional piece defaulted: no dataset means no
/// rows, no chart means a bar chart without axes.
#[derive(Debug)]
pub struct RenderContext {
    pub dashboard: DashboardRow,
    pub chart_type: Option<String>,
    pub renderer: Renderer,
    /// Raw rows of the dataset file, header first.
    pub rows: Vec<Vec<String>>,
    pub has_file: bool,
    pub columns: Vec<DatasetColumnRow>,
    /// Axis -> selected column name.
    pub axis: BTreeMap<AxisRole, String>,
    /// Axis -> column letter of the selection in the current header.
    pub axis_letter: BTreeMap<AxisRole, String>,
}

/// Builds the render context of a dashboard. The dataset file is re-read on
/// every call; a file that cannot be parsed renders as empty.
pub fn resolve_render_context(
    db: &Database,
    store: &dyn FileStore,
    dashboard: DashboardRow,
) -> Result<RenderContext, ApiError> {
    let dataset = db.get_dataset_for_dashboard(&dashboard.id)?;
    let chart = db.get_chart_for_dashboard(&dashboard.id)?;

    let (columns, handle) = match &dataset {
        Some(ds) => (db.get_columns(&ds.id)?, ds.file_handle.clone()),
        None => (Vec::new(), None),
    };

    let has_file = handle.is_some();
    let rows = match handle {
        Some(handle) => read_rows(store, &dashboard.id, &FileHandle::from_stored(handle))?,
        None => Vec::new(),
    };

    let selections = match &chart {
        Some(chart) => db.get_selections(&chart.id)?,
        None => Vec::new(),
    };

    let header = rows.first().map(Vec::as_slice).unwrap_or_default();
    let mut axis = BTreeMap::new();
    let mut axis_letter = BTreeMap::new();
    for selection in selections {
        let letter = match header.iter().position(|name| *name == selection.column_name) {
            Some(index) => columns::index_to_letter(index),
            None => selection.column_name.clone(),
        };
        axis_letter.insert(selection.axis, letter);
        axis.insert(selection.axis, selection.column_name);
    }

    let chart_type = chart.and_then(|c| c.chart_type);
    Ok(RenderContext {
        renderer: Renderer::for_chart_type(chart_type.as_deref()),
        dashboard,
        chart_type,
        rows,
        has_file,
        columns,
        axis,
        axis_letter,
    })
}

fn read_rows(store: &dyn FileStore, dashboard_id: &str, handle: &FileHandle) -> Result<Vec<Vec<String>>, ApiError> {
    let bytes = match store.read(handle) {
        Ok(bytes) => bytes,
        Err(DatasetError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Dataset file {} for dashboard {} is missing", handle, dashboard_id);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    match csv_file::read_rows(&bytes) {
        Ok(rows) => Ok(rows),
        Err(e) => {
            warn!("Dataset file {} for dashboard {} is malformed: {}", handle, dashboard_id, e);
            Ok(Vec::new())
        }
    }
}

impl RenderContext {
    pub fn dashboard_info(&self) -> DashboardInfo {
        dashboard_info(&self.dashboard)
    }

    pub fn chart_preview(&self) -> ChartPreview {
        ChartPreview {
            id: parse_id(&self.dashboard.id),
            renderer: self.renderer,
            chart_type: self.chart_type.clone(),
            data: self.rows.clone(),
            axis: self.axis.clone(),
        }
    }

    /// Owner view, with the letters that prefill the selection form.
    pub fn into_view(self) -> DashboardView {
        let columns = self
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                data_type: c.data_type.clone(),
                letter: columns::index_to_letter(c.position),
            })
            .collect();

        DashboardView {
            dashboard: self.dashboard_info(),
            chart: self.chart_preview(),
            has_file: self.has_file,
            columns,
            axis_letter: self.axis_letter,
        }
    }
}

pub fn dashboard_info(row: &DashboardRow) -> DashboardInfo {
    DashboardInfo {
        id: parse_id(&row.id),
        name: row.name.clone(),
        description: row.description.clone(),
        visibility: Visibility::from_private_flag(row.is_private),
        is_private: row.is_private,
        created_at: parse_timestamp(&row.created_at, &row.id),
        updated_at: parse_timestamp(&row.updated_at, &row.id),
    }
}

pub(crate) fn parse_id(id: &str) -> Uuid {
    id.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", id, e);
        Uuid::default()
    })
}

/// SQLite's `CURRENT_TIMESTAMP` has no timezone; it is UTC.
pub(crate) fn parse_timestamp(value: &str, owner: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on '{}': {}", value, owner, e);
            DateTime::default()
        })
}
