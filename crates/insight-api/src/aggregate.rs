//! Write side of a dashboard: its metadata, dataset file, columns, chart and
//! axis selections.
//!
//! All functions block and are meant to run on the blocking pool. Every
//! multi-row write happens in a single transaction. New files are stored
//! before the transaction and removed again if it fails; replaced files are
//! removed only after it commits.

use std::collections::BTreeMap;

use rusqlite::Connection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use insight_dataset::columns;
use insight_dataset::csv_file;
use insight_dataset::storage::{FileHandle, FileStore};
use insight_db::Database;
use insight_db::charts::{find_chart_for_dashboard, list_selections, upsert_chart, upsert_selection};
use insight_db::datasets::{
    clear_columns, ensure_dataset, find_column_by_name, find_dataset_for_dashboard, list_columns,
    replace_columns, set_file_handle,
};
use insight_db::models::{ChartRow, DashboardRow, DatasetRow};
use insight_db::queries::{self, DashboardChanges, find_owned_dashboard, update_dashboard};
use insight_types::models::AxisRole;

use crate::error::ApiError;
use crate::forms::FileChange;

/// A file already written to the store, waiting for its reference swap.
struct StagedFile {
    /// `None` when the dataset's file is being cleared.
    handle: Option<FileHandle>,
    header: Vec<String>,
}

pub fn create_dashboard(db: &Database, user_id: &str) -> Result<DashboardRow, ApiError> {
    let id = Uuid::new_v4().to_string();
    let dashboard = db.create_dashboard(&id, user_id)?;
    info!("Dashboard {} created by {}", id, user_id);
    Ok(dashboard)
}

/// "chart" action: saves metadata and dataset, then creates the dashboard's
/// chart or updates its type and dataset in place.
pub fn apply_chart_action(
    db: &Database,
    store: &dyn FileStore,
    user_id: &str,
    dashboard_id: &str,
    changes: &DashboardChanges,
    chart_type: &str,
    file: &FileChange,
) -> Result<(), ApiError> {
    let staged = stage(store, file)?;

    let result = db.with_tx(|conn| {
        owned(conn, dashboard_id, user_id)?;
        update_dashboard(conn, dashboard_id, changes)?;

        let dataset = ensure_dataset(conn, user_id, dashboard_id)?;
        let chart = upsert_chart(conn, dashboard_id, &dataset.id, chart_type)?;

        match &staged {
            Some(staged) => swap_file(conn, &dataset, Some(&chart), staged, &BTreeMap::new()),
            None => Ok(None),
        }
    });

    finish(store, staged, result)?;
    info!("Dashboard {} chart saved ({})", dashboard_id, chart_type);
    Ok(())
}

/// "data" action: saves metadata, swaps the dataset file if one was uploaded
/// or cleared, and applies the submitted axis letters.
///
/// When the file changes, previous selections are carried over by letter and
/// re-resolved against the new header; roles that no longer resolve are
/// dropped. Selections need a chart and are ignored without one.
pub fn apply_data_action(
    db: &Database,
    store: &dyn FileStore,
    user_id: &str,
    dashboard_id: &str,
    changes: &DashboardChanges,
    file: &FileChange,
    axes: &BTreeMap<AxisRole, String>,
) -> Result<(), ApiError> {
    let staged = stage(store, file)?;

    let result = db.with_tx(|conn| {
        owned(conn, dashboard_id, user_id)?;
        update_dashboard(conn, dashboard_id, changes)?;

        let chart = find_chart_for_dashboard(conn, dashboard_id)?;
        if chart.is_none() && !axes.is_empty() {
            debug!("Dashboard {} has no chart; ignoring axis selections", dashboard_id);
        }

        match &staged {
            Some(staged) => {
                let dataset = ensure_dataset(conn, user_id, dashboard_id)?;
                swap_file(conn, &dataset, chart.as_ref(), staged, axes)
            }
            None => {
                if let Some(chart) = &chart {
                    let header = stored_header(conn, chart)?;
                    for (role, letter) in axes {
                        set_selection(conn, chart, *role, letter, &header)?;
                    }
                }
                Ok(None)
            }
        }
    });

    finish(store, staged, result)
}

/// Replaces the dashboard's dataset file with CSV text from the spreadsheet
/// editor. Returns `false` when the dashboard has no dataset yet.
pub fn overwrite_csv(
    db: &Database,
    store: &dyn FileStore,
    user_id: &str,
    dashboard_id: &str,
    body: &[u8],
) -> Result<bool, ApiError> {
    if db.get_owned_dashboard(dashboard_id, user_id)?.is_none() {
        return Err(ApiError::NotFound);
    }
    if db.get_dataset_for_dashboard(dashboard_id)?.is_none() {
        return Ok(false);
    }

    let text = std::str::from_utf8(body)
        .map_err(|_| ApiError::BadRequest("CSV body must be UTF-8 text".into()))?;
    let normalized = csv_file::normalize(text).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let header = header_or_empty(&normalized);
    let staged = StagedFile {
        handle: Some(store.put(&normalized)?),
        header,
    };

    let result = db.with_tx(|conn| {
        owned(conn, dashboard_id, user_id)?;
        let dataset = find_dataset_for_dashboard(conn, dashboard_id)?
            .ok_or_else(|| anyhow::Error::from(ApiError::NotFound))?;
        let chart = find_chart_for_dashboard(conn, dashboard_id)?;
        swap_file(conn, &dataset, chart.as_ref(), &staged, &BTreeMap::new())
    });

    finish(store, Some(staged), result)?;
    info!("Dashboard {} dataset overwritten from editor ({} bytes)", dashboard_id, body.len());
    Ok(true)
}

/// Deletes a dashboard with its dataset, chart and selections, then removes
/// the stored file. Comments and likes stay, detached from the dashboard.
pub fn delete_dashboard(
    db: &Database,
    store: &dyn FileStore,
    user_id: &str,
    dashboard_id: &str,
) -> Result<(), ApiError> {
    let handle = db.with_tx(|conn| {
        owned(conn, dashboard_id, user_id)?;
        let dataset = find_dataset_for_dashboard(conn, dashboard_id)?;
        queries::delete_dashboard(conn, dashboard_id)?;
        Ok(dataset.and_then(|d| d.file_handle))
    })?;

    if let Some(handle) = handle {
        remove_quietly(store, &FileHandle::from_stored(handle));
    }
    info!("Dashboard {} deleted by {}", dashboard_id, user_id);
    Ok(())
}

/// Binds an axis of `chart` to the column `letter` points at in `header`.
///
/// Letters that do not resolve to a column of the chart's dataset are
/// ignored, leaving any previous selection for that axis in place. Returns
/// the selected column name.
pub fn set_selection(
    conn: &Connection,
    chart: &ChartRow,
    role: AxisRole,
    letter: &str,
    header: &[String],
) -> anyhow::Result<Option<String>> {
    let Some(name) = columns::resolve(letter, header) else {
        debug!("Ignoring {} selection {:?}: not a column of the header", role, letter);
        return Ok(None);
    };
    let Some(dataset_id) = chart.dataset_id.as_deref() else {
        debug!("Ignoring {} selection: chart {} has no dataset", role, chart.id);
        return Ok(None);
    };
    let Some(column) = find_column_by_name(conn, dataset_id, name)? else {
        debug!("Ignoring {} selection {:?}: no column named {:?}", role, letter, name);
        return Ok(None);
    };

    upsert_selection(conn, &chart.id, role, &column.id)?;
    Ok(Some(column.name))
}

/// Current selections of a chart as axis -> column name.
pub fn current_selections(db: &Database, chart_id: &str) -> Result<BTreeMap<AxisRole, String>, ApiError> {
    let rows = db.get_selections(chart_id)?;
    Ok(rows.into_iter().map(|s| (s.axis, s.column_name)).collect())
}

fn owned(conn: &Connection, dashboard_id: &str, user_id: &str) -> anyhow::Result<DashboardRow> {
    find_owned_dashboard(conn, dashboard_id, user_id)?.ok_or_else(|| ApiError::NotFound.into())
}

/// Writes an uploaded file to the store and reads its header.
fn stage(store: &dyn FileStore, file: &FileChange) -> Result<Option<StagedFile>, ApiError> {
    match file {
        FileChange::Keep => Ok(None),
        FileChange::Clear => Ok(Some(StagedFile {
            handle: None,
            header: Vec::new(),
        })),
        FileChange::Replace(bytes) => {
            let header = header_or_empty(bytes);
            let handle = store.put(bytes)?;
            Ok(Some(StagedFile {
                handle: Some(handle),
                header,
            }))
        }
    }
}

fn header_or_empty(bytes: &[u8]) -> Vec<String> {
    csv_file::parse_header(bytes).unwrap_or_else(|e| {
        warn!("Uploaded dataset has no usable header: {}", e);
        Vec::new()
    })
}

/// Header of the chart's dataset as committed in its column rows. Positions
/// skipped by duplicate names stay empty and resolve to nothing.
fn stored_header(conn: &Connection, chart: &ChartRow) -> anyhow::Result<Vec<String>> {
    let Some(dataset_id) = chart.dataset_id.as_deref() else {
        return Ok(Vec::new());
    };
    let columns = list_columns(conn, dataset_id)?;
    let mut header = vec![String::new(); columns.last().map_or(0, |c| c.position + 1)];
    for column in columns {
        header[column.position] = column.name;
    }
    Ok(header)
}

/// Points the dataset at the staged file, rebuilds its columns and
/// re-resolves axis letters against the new header. `overrides` take
/// precedence over the letters of the previous selections.
///
/// Returns the handle the dataset pointed at before.
fn swap_file(
    conn: &Connection,
    dataset: &DatasetRow,
    chart: Option<&ChartRow>,
    staged: &StagedFile,
    overrides: &BTreeMap<AxisRole, String>,
) -> anyhow::Result<Option<String>> {
    let mut letters: BTreeMap<AxisRole, String> = match chart {
        Some(chart) => list_selections(conn, &chart.id)?
            .into_iter()
            .map(|s| (s.axis, columns::index_to_letter(s.column_position)))
            .collect(),
        None => BTreeMap::new(),
    };
    letters.extend(overrides.iter().map(|(role, letter)| (*role, letter.clone())));

    set_file_handle(conn, &dataset.id, staged.handle.as_ref().map(FileHandle::as_str))?;
    match &staged.handle {
        Some(_) => {
            replace_columns(conn, &dataset.id, &staged.header)?;
        }
        None => {
            clear_columns(conn, &dataset.id)?;
        }
    }

    if let Some(chart) = chart {
        for (role, letter) in &letters {
            if set_selection(conn, chart, *role, letter, &staged.header)?.is_none() {
                debug!("Dropped {} selection {:?} after dataset change", role, letter);
            }
        }
    }

    Ok(dataset.file_handle.clone())
}

/// Cleans up the store once the transaction outcome is known.
fn finish(
    store: &dyn FileStore,
    staged: Option<StagedFile>,
    result: anyhow::Result<Option<String>>,
) -> Result<(), ApiError> {
    match result {
        Ok(previous) => {
            let current = staged.as_ref().and_then(|s| s.handle.as_ref());
            if let (Some(_), Some(previous)) = (&staged, previous) {
                let previous = FileHandle::from_stored(previous);
                if Some(&previous) != current {
                    remove_quietly(store, &previous);
                }
            }
            Ok(())
        }
        Err(e) => {
            if let Some(handle) = staged.and_then(|s| s.handle) {
                remove_quietly(store, &handle);
            }
            Err(e.into())
        }
    }
}

fn remove_quietly(store: &dyn FileStore, handle: &FileHandle) {
    if let Err(e) = store.delete(handle) {
        warn!("Failed to delete stored file {}: {}", handle, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_dataset::storage::DiskStore;

    struct Fixture {
        db: Database,
        store: DiskStore,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path()).unwrap();
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "ann", "ann@example.com", "hash").unwrap();
        db.create_user("u2", "bob", "bob@example.com", "hash").unwrap();
        db.create_dashboard("d1", "u1").unwrap();
        Fixture { db, store, _dir: dir }
    }

    fn replace(bytes: &[u8]) -> FileChange {
        FileChange::Replace(bytes.to_vec())
    }

    fn axes(pairs: &[(AxisRole, &str)]) -> BTreeMap<AxisRole, String> {
        pairs.iter().map(|(r, l)| (*r, l.to_string())).collect()
    }

    fn chart_with(f: &Fixture, csv: &[u8]) -> ChartRow {
        apply_chart_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), "Bar Chart", &replace(csv))
            .unwrap();
        f.db.get_chart_for_dashboard("d1").unwrap().unwrap()
    }

    fn selections(f: &Fixture) -> BTreeMap<AxisRole, String> {
        let chart = f.db.get_chart_for_dashboard("d1").unwrap().unwrap();
        current_selections(&f.db, &chart.id).unwrap()
    }

    #[test]
    fn chart_action_creates_dataset_columns_and_chart() {
        let f = fixture();
        let changes = DashboardChanges {
            name: Some("Sales".into()),
            is_private: Some(false),
            ..Default::default()
        };
        apply_chart_action(&f.db, &f.store, "u1", "d1", &changes, "Line Chart", &replace(b"month,sales\nJan,3\n"))
            .unwrap();

        let dashboard = f.db.get_dashboard("d1").unwrap().unwrap();
        assert_eq!(dashboard.name, "Sales");
        assert!(!dashboard.is_private);

        let dataset = f.db.get_dataset_for_dashboard("d1").unwrap().unwrap();
        let cols: Vec<_> = f.db.get_columns(&dataset.id).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(cols, vec!["month", "sales"]);

        let chart = f.db.get_chart_for_dashboard("d1").unwrap().unwrap();
        assert_eq!(chart.chart_type.as_deref(), Some("Line Chart"));
        assert_eq!(chart.dataset_id.as_deref(), Some(dataset.id.as_str()));
    }

    #[test]
    fn selection_ignores_out_of_range_letters() {
        let f = fixture();
        chart_with(&f, b"a,b,c\n1,2,3\n");

        apply_data_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), &FileChange::Keep, &axes(&[(AxisRole::X, "B")]))
            .unwrap();
        assert_eq!(selections(&f)[&AxisRole::X], "b");

        apply_data_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), &FileChange::Keep, &axes(&[(AxisRole::X, "Z")]))
            .unwrap();
        assert_eq!(selections(&f)[&AxisRole::X], "b");

        apply_data_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), &FileChange::Keep, &axes(&[(AxisRole::X, "1")]))
            .unwrap();
        assert_eq!(selections(&f)[&AxisRole::X], "b");
    }

    #[test]
    fn selection_resolves_against_committed_columns_not_the_file() {
        let f = fixture();
        chart_with(&f, b"a,b,c\n1,2,3\n");
        let handle = f.db.get_dataset_for_dashboard("d1").unwrap().unwrap().file_handle.unwrap();
        f.store.delete(&FileHandle::from_stored(handle)).unwrap();

        apply_data_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), &FileChange::Keep, &axes(&[(AxisRole::X, "B")]))
            .unwrap();
        assert_eq!(selections(&f)[&AxisRole::X], "b");
    }

    #[test]
    fn duplicate_header_names_leave_their_letter_unresolved() {
        let f = fixture();
        chart_with(&f, b"a,a,c\n");

        apply_data_action(
            &f.db,
            &f.store,
            "u1",
            "d1",
            &DashboardChanges::default(),
            &FileChange::Keep,
            &axes(&[(AxisRole::X, "B"), (AxisRole::Y, "C")]),
        )
        .unwrap();
        let sel = selections(&f);
        assert!(!sel.contains_key(&AxisRole::X));
        assert_eq!(sel[&AxisRole::Y], "c");
    }

    #[test]
    fn set_selection_reports_the_chosen_column() {
        let f = fixture();
        let chart = chart_with(&f, b"a,b,c\n");
        let header: Vec<String> = vec!["a".into(), "b".into(), "c".into()];

        let chosen = f.db.with_tx(|conn| set_selection(conn, &chart, AxisRole::Y, "c", &header)).unwrap();
        assert_eq!(chosen.as_deref(), Some("c"));
        let ignored = f.db.with_tx(|conn| set_selection(conn, &chart, AxisRole::Y, "D", &header)).unwrap();
        assert!(ignored.is_none());
        assert_eq!(selections(&f)[&AxisRole::Y], "c");
    }

    #[test]
    fn reupload_rederives_selections_by_letter() {
        let f = fixture();
        chart_with(&f, b"a,b,c\n");
        apply_data_action(
            &f.db,
            &f.store,
            "u1",
            "d1",
            &DashboardChanges::default(),
            &FileChange::Keep,
            &axes(&[(AxisRole::X, "A"), (AxisRole::Y, "C")]),
        )
        .unwrap();

        // New file has only two columns: C no longer resolves.
        apply_data_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), &replace(b"x,y\n"), &BTreeMap::new())
            .unwrap();

        let sel = selections(&f);
        assert_eq!(sel.len(), 1);
        assert_eq!(sel[&AxisRole::X], "x");
    }

    #[test]
    fn submitted_letters_override_carried_ones_on_reupload() {
        let f = fixture();
        chart_with(&f, b"a,b,c\n");
        apply_data_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), &FileChange::Keep, &axes(&[(AxisRole::X, "A")]))
            .unwrap();

        apply_data_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), &replace(b"p,q,r\n"), &axes(&[(AxisRole::X, "B")]))
            .unwrap();
        assert_eq!(selections(&f)[&AxisRole::X], "q");
    }

    #[test]
    fn clearing_the_file_drops_columns_and_old_file() {
        let f = fixture();
        chart_with(&f, b"a,b\n");
        let old = f.db.get_dataset_for_dashboard("d1").unwrap().unwrap().file_handle.unwrap();

        apply_data_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), &FileChange::Clear, &BTreeMap::new())
            .unwrap();

        let dataset = f.db.get_dataset_for_dashboard("d1").unwrap().unwrap();
        assert!(dataset.file_handle.is_none());
        assert!(f.db.get_columns(&dataset.id).unwrap().is_empty());
        assert!(f.store.read(&FileHandle::from_stored(old)).is_err());
    }

    #[test]
    fn reupload_swaps_handle_and_removes_previous_file() {
        let f = fixture();
        chart_with(&f, b"a,b\n");
        let first = f.db.get_dataset_for_dashboard("d1").unwrap().unwrap().file_handle.unwrap();

        chart_with(&f, b"x,y,z\n");
        let second = f.db.get_dataset_for_dashboard("d1").unwrap().unwrap().file_handle.unwrap();

        assert_ne!(first, second);
        assert!(f.store.read(&FileHandle::from_stored(first)).is_err());
        assert_eq!(f.store.read(&FileHandle::from_stored(second)).unwrap(), b"x,y,z\n");
    }

    #[test]
    fn malformed_upload_yields_zero_columns() {
        let f = fixture();
        chart_with(&f, &[0xff, 0xfe, 0x00]);
        let dataset = f.db.get_dataset_for_dashboard("d1").unwrap().unwrap();
        assert!(dataset.file_handle.is_some());
        assert!(f.db.get_columns(&dataset.id).unwrap().is_empty());
    }

    #[test]
    fn foreign_dashboards_are_not_found_and_untouched() {
        let f = fixture();
        let err = apply_chart_action(&f.db, &f.store, "u2", "d1", &DashboardChanges::default(), "Bar Chart", &replace(b"a\n"))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
        assert!(f.db.get_dataset_for_dashboard("d1").unwrap().is_none());
        assert!(matches!(delete_dashboard(&f.db, &f.store, "u2", "d1"), Err(ApiError::NotFound)));
    }

    #[test]
    fn overwrite_needs_a_dataset() {
        let f = fixture();
        assert!(!overwrite_csv(&f.db, &f.store, "u1", "d1", b"a,b\n1,2\n").unwrap());

        chart_with(&f, b"a,b\n1,2\n");
        apply_data_action(&f.db, &f.store, "u1", "d1", &DashboardChanges::default(), &FileChange::Keep, &axes(&[(AxisRole::Y, "B")]))
            .unwrap();

        assert!(overwrite_csv(&f.db, &f.store, "u1", "d1", b"a,b\n9,\"8,5\"\n").unwrap());
        let handle = f.db.get_dataset_for_dashboard("d1").unwrap().unwrap().file_handle.unwrap();
        assert_eq!(f.store.read(&FileHandle::from_stored(handle)).unwrap(), b"a,b\n9,\"8,5\"\n");
        assert_eq!(selections(&f)[&AxisRole::Y], "b");
    }

    #[test]
    fn delete_removes_stored_file() {
        let f = fixture();
        chart_with(&f, b"a,b\n");
        let handle = f.db.get_dataset_for_dashboard("d1").unwrap().unwrap().file_handle.unwrap();

        delete_dashboard(&f.db, &f.store, "u1", "d1").unwrap();
        assert!(f.db.get_dashboard("d1").unwrap().is_none());
        assert!(f.store.read(&FileHandle::from_stored(handle)).is_err());
    }
}
