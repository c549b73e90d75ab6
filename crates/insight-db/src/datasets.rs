use crate::models::{DatasetColumnRow, DatasetRow};
use crate::{Database, OptionalExt};
use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

/// Declared type for every materialized column; no inference is done.
pub const STRING_TYPE: &str = "string";

impl Database {
    pub fn get_dataset_for_dashboard(&self, dashboard_id: &str) -> Result<Option<DatasetRow>> {
        self.with_conn(|conn| find_dataset_for_dashboard(conn, dashboard_id))
    }

    pub fn get_columns(&self, dataset_id: &str) -> Result<Vec<DatasetColumnRow>> {
        self.with_conn(|conn| list_columns(conn, dataset_id))
    }
}

pub fn find_dataset_for_dashboard(conn: &Connection, dashboard_id: &str) -> Result<Option<DatasetRow>> {
    conn.query_row(
        "SELECT id, user_id, dashboard_id, file_handle, created_at FROM datasets WHERE dashboard_id = ?1",
        [dashboard_id],
        dataset_from_row,
    )
    .optional()
}

/// Returns the dashboard's dataset, creating an empty one if it has none.
pub fn ensure_dataset(conn: &Connection, user_id: &str, dashboard_id: &str) -> Result<DatasetRow> {
    if let Some(existing) = find_dataset_for_dashboard(conn, dashboard_id)? {
        return Ok(existing);
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO datasets (id, user_id, dashboard_id) VALUES (?1, ?2, ?3)",
        (&id, user_id, dashboard_id),
    )?;
    find_dataset_for_dashboard(conn, dashboard_id)?
        .ok_or_else(|| anyhow::anyhow!("Dataset vanished after insert: {}", id))
}

/// Points the dataset at a different stored file (or none).
pub fn set_file_handle(conn: &Connection, dataset_id: &str, handle: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE datasets SET file_handle = ?2 WHERE id = ?1",
        rusqlite::params![dataset_id, handle],
    )?;
    Ok(())
}

/// Replaces the dataset's columns with one `string` column per header name.
///
/// Existing columns are deleted first, which also drops any selections that
/// referenced them. Repeated header names keep their first position.
pub fn replace_columns(conn: &Connection, dataset_id: &str, header: &[String]) -> Result<Vec<DatasetColumnRow>> {
    clear_columns(conn, dataset_id)?;

    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO dataset_columns (id, dataset_id, position, name, data_type)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, name) in header.iter().enumerate() {
        stmt.execute(rusqlite::params![
            Uuid::new_v4().to_string(),
            dataset_id,
            position as i64,
            name,
            STRING_TYPE,
        ])?;
    }

    list_columns(conn, dataset_id)
}

pub fn clear_columns(conn: &Connection, dataset_id: &str) -> Result<usize> {
    let n = conn.execute("DELETE FROM dataset_columns WHERE dataset_id = ?1", [dataset_id])?;
    Ok(n)
}

pub fn list_columns(conn: &Connection, dataset_id: &str) -> Result<Vec<DatasetColumnRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, dataset_id, position, name, data_type FROM dataset_columns
         WHERE dataset_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map([dataset_id], column_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_column_by_name(conn: &Connection, dataset_id: &str, name: &str) -> Result<Option<DatasetColumnRow>> {
    conn.query_row(
        "SELECT id, dataset_id, position, name, data_type FROM dataset_columns
         WHERE dataset_id = ?1 AND name = ?2",
        [dataset_id, name],
        column_from_row,
    )
    .optional()
}

fn dataset_from_row(row: &Row<'_>) -> rusqlite::Result<DatasetRow> {
    Ok(DatasetRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        dashboard_id: row.get(2)?,
        file_handle: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn column_from_row(row: &Row<'_>) -> rusqlite::Result<DatasetColumnRow> {
    Ok(DatasetColumnRow {
        id: row.get(0)?,
        dataset_id: row.get(1)?,
        position: row.get::<_, i64>(2)? as usize,
        name: row.get(3)?,
        data_type: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::db_with_user;

    fn names(cols: &[DatasetColumnRow]) -> Vec<&str> {
        cols.iter().map(|c| c.name.as_str()).collect()
    }

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reupload_replaces_all_columns() {
        let db = db_with_user("u1");
        db.create_dashboard("d1", "u1").unwrap();

        let cols = db
            .with_tx(|conn| {
                let ds = ensure_dataset(conn, "u1", "d1")?;
                replace_columns(conn, &ds.id, &header(&["a", "b"]))?;
                replace_columns(conn, &ds.id, &header(&["x", "y", "z"]))
            })
            .unwrap();

        assert_eq!(names(&cols), vec!["x", "y", "z"]);
        assert!(cols.iter().all(|c| c.data_type == STRING_TYPE));
        let total: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM dataset_columns", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(total, 3);
    }

    #[test]
    fn duplicate_header_names_keep_first_position() {
        let db = db_with_user("u1");
        db.create_dashboard("d1", "u1").unwrap();

        let cols = db
            .with_tx(|conn| {
                let ds = ensure_dataset(conn, "u1", "d1")?;
                replace_columns(conn, &ds.id, &header(&["a", "b", "a", "c"]))
            })
            .unwrap();

        assert_eq!(names(&cols), vec!["a", "b", "c"]);
        assert_eq!(cols[2].position, 3);
    }

    #[test]
    fn ensure_dataset_is_one_per_dashboard() {
        let db = db_with_user("u1");
        db.create_dashboard("d1", "u1").unwrap();

        let (first, second) = db
            .with_tx(|conn| Ok((ensure_dataset(conn, "u1", "d1")?, ensure_dataset(conn, "u1", "d1")?)))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.file_handle.is_none());
    }

    #[test]
    fn file_handle_can_be_cleared() {
        let db = db_with_user("u1");
        db.create_dashboard("d1", "u1").unwrap();

        db.with_tx(|conn| {
            let ds = ensure_dataset(conn, "u1", "d1")?;
            set_file_handle(conn, &ds.id, Some("f.csv"))?;
            set_file_handle(conn, &ds.id, None)
        })
        .unwrap();

        let ds = db.get_dataset_for_dashboard("d1").unwrap().unwrap();
        assert!(ds.file_handle.is_none());
    }
}
