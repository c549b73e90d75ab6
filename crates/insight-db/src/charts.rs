use crate::models::{ChartRow, ChartTypeRow, SelectionRow};
use crate::{Database, OptionalExt};
use anyhow::Result;
use insight_types::models::AxisRole;
use rusqlite::{Connection, Row};
use tracing::warn;
use uuid::Uuid;

impl Database {
    pub fn list_chart_types(&self) -> Result<Vec<ChartTypeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM chart_types ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| Ok(ChartTypeRow { id: row.get(0)?, name: row.get(1)? }))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_chart_for_dashboard(&self, dashboard_id: &str) -> Result<Option<ChartRow>> {
        self.with_conn(|conn| find_chart_for_dashboard(conn, dashboard_id))
    }

    pub fn get_selections(&self, chart_id: &str) -> Result<Vec<SelectionRow>> {
        self.with_conn(|conn| list_selections(conn, chart_id))
    }
}

pub fn find_chart_for_dashboard(conn: &Connection, dashboard_id: &str) -> Result<Option<ChartRow>> {
    conn.query_row(
        "SELECT id, dashboard_id, dataset_id, chart_type FROM charts WHERE dashboard_id = ?1",
        [dashboard_id],
        chart_from_row,
    )
    .optional()
}

/// Creates the dashboard's chart, or updates type and dataset of the existing
/// one in place. A dashboard never has more than one chart.
pub fn upsert_chart(
    conn: &Connection,
    dashboard_id: &str,
    dataset_id: &str,
    chart_type: &str,
) -> Result<ChartRow> {
    conn.execute(
        "INSERT INTO charts (id, dashboard_id, dataset_id, chart_type) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(dashboard_id) DO UPDATE SET
             dataset_id = excluded.dataset_id,
             chart_type = excluded.chart_type,
             updated_at = datetime('now')",
        (Uuid::new_v4().to_string(), dashboard_id, dataset_id, chart_type),
    )?;
    find_chart_for_dashboard(conn, dashboard_id)?
        .ok_or_else(|| anyhow::anyhow!("Chart vanished after upsert for dashboard {}", dashboard_id))
}

/// Binds `axis` of a chart to a column, replacing any previous binding for
/// that axis.
pub fn upsert_selection(conn: &Connection, chart_id: &str, axis: AxisRole, column_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO selected_columns (id, chart_id, axis, column_id) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(chart_id, axis) DO UPDATE SET column_id = excluded.column_id",
        (Uuid::new_v4().to_string(), chart_id, axis.as_str(), column_id),
    )?;
    Ok(())
}

pub fn list_selections(conn: &Connection, chart_id: &str) -> Result<Vec<SelectionRow>> {
    let mut stmt = conn.prepare(
        "SELECT s.chart_id, s.axis, c.id, c.name, c.position
         FROM selected_columns s
         JOIN dataset_columns c ON c.id = s.column_id
         WHERE s.chart_id = ?1",
    )?;
    let raw = stmt
        .query_map([chart_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(raw.len());
    for (chart_id, axis, column_id, column_name, position) in raw {
        match axis.parse::<AxisRole>() {
            Ok(axis) => rows.push(SelectionRow {
                chart_id,
                axis,
                column_id,
                column_name,
                column_position: position as usize,
            }),
            Err(e) => warn!("Skipping selection on chart {}: {}", chart_id, e),
        }
    }
    rows.sort_by_key(|r| r.axis);
    Ok(rows)
}

fn chart_from_row(row: &Row<'_>) -> rusqlite::Result<ChartRow> {
    Ok(ChartRow {
        id: row.get(0)?,
        dashboard_id: row.get(1)?,
        dataset_id: row.get(2)?,
        chart_type: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{ensure_dataset, replace_columns};
    use crate::queries::test_support::db_with_user;

    fn setup() -> (Database, String, Vec<crate::models::DatasetColumnRow>) {
        let db = db_with_user("u1");
        db.create_dashboard("d1", "u1").unwrap();
        let (dataset_id, cols) = db
            .with_tx(|conn| {
                let ds = ensure_dataset(conn, "u1", "d1")?;
                let cols = replace_columns(conn, &ds.id, &["a".into(), "b".into(), "c".into()])?;
                Ok((ds.id, cols))
            })
            .unwrap();
        (db, dataset_id, cols)
    }

    #[test]
    fn chart_is_created_once_then_updated() {
        let (db, dataset_id, _) = setup();

        let first = db.with_tx(|conn| upsert_chart(conn, "d1", &dataset_id, "Bar Chart")).unwrap();
        let second = db.with_tx(|conn| upsert_chart(conn, "d1", &dataset_id, "Line Chart")).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.chart_type.as_deref(), Some("Line Chart"));
        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM charts", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn unknown_chart_type_is_rejected_by_schema() {
        let (db, dataset_id, _) = setup();
        assert!(db.with_tx(|conn| upsert_chart(conn, "d1", &dataset_id, "Pie Chart")).is_err());
        let names: Vec<_> = db.list_chart_types().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Bar Chart", "Line Chart"]);
    }

    #[test]
    fn one_selection_per_axis() {
        let (db, dataset_id, cols) = setup();
        let chart = db.with_tx(|conn| upsert_chart(conn, "d1", &dataset_id, "Bar Chart")).unwrap();

        db.with_tx(|conn| {
            upsert_selection(conn, &chart.id, AxisRole::X, &cols[0].id)?;
            upsert_selection(conn, &chart.id, AxisRole::X, &cols[1].id)?;
            upsert_selection(conn, &chart.id, AxisRole::Y, &cols[2].id)
        })
        .unwrap();

        let sel = db.get_selections(&chart.id).unwrap();
        assert_eq!(sel.len(), 2);
        assert_eq!(sel[0].axis, AxisRole::X);
        assert_eq!(sel[0].column_name, "b");
        assert_eq!(sel[0].column_position, 1);
        assert_eq!(sel[1].axis, AxisRole::Y);
        assert_eq!(sel[1].column_name, "c");
    }

    #[test]
    fn replacing_columns_drops_selections() {
        let (db, dataset_id, cols) = setup();
        let chart = db.with_tx(|conn| upsert_chart(conn, "d1", &dataset_id, "Bar Chart")).unwrap();
        db.with_tx(|conn| upsert_selection(conn, &chart.id, AxisRole::X, &cols[0].id)).unwrap();

        db.with_tx(|conn| replace_columns(conn, &dataset_id, &["x".into()])).unwrap();
        assert!(db.get_selections(&chart.id).unwrap().is_empty());
    }
}
