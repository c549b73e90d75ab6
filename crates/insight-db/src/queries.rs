use crate::models::{DashboardRow, UserRow};
use crate::{Database, OptionalExt};
use anyhow::Result;
use rusqlite::{Connection, Row};

const DASHBOARD_COLUMNS: &str =
    "id, user_id, name, description, is_private, created_at, updated_at";

/// Metadata changes from the dashboard form. `None` keeps the stored value.
#[derive(Debug, Default, Clone)]
pub struct DashboardChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, password, created_at FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        password: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Dashboards --

    /// Creates an empty dashboard with the default name, private.
    pub fn create_dashboard(&self, id: &str, user_id: &str) -> Result<DashboardRow> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO dashboards (id, user_id) VALUES (?1, ?2)", (id, user_id))?;
            find_dashboard(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Dashboard vanished after insert: {}", id))
        })
    }

    pub fn get_dashboard(&self, id: &str) -> Result<Option<DashboardRow>> {
        self.with_conn(|conn| find_dashboard(conn, id))
    }

    /// Fetches a dashboard only if `user_id` owns it.
    pub fn get_owned_dashboard(&self, id: &str, user_id: &str) -> Result<Option<DashboardRow>> {
        self.with_conn(|conn| find_owned_dashboard(conn, id, user_id))
    }

    pub fn list_dashboards_for_user(&self, user_id: &str) -> Result<Vec<DashboardRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {DASHBOARD_COLUMNS} FROM dashboards WHERE user_id = ?1 ORDER BY created_at DESC, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], dashboard_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub fn find_dashboard(conn: &Connection, id: &str) -> Result<Option<DashboardRow>> {
    let sql = format!("SELECT {DASHBOARD_COLUMNS} FROM dashboards WHERE id = ?1");
    conn.query_row(&sql, [id], dashboard_from_row).optional()
}

pub fn find_owned_dashboard(conn: &Connection, id: &str, user_id: &str) -> Result<Option<DashboardRow>> {
    let sql = format!("SELECT {DASHBOARD_COLUMNS} FROM dashboards WHERE id = ?1 AND user_id = ?2");
    conn.query_row(&sql, [id, user_id], dashboard_from_row).optional()
}

pub fn update_dashboard(conn: &Connection, id: &str, changes: &DashboardChanges) -> Result<()> {
    conn.execute(
        "UPDATE dashboards
         SET name = COALESCE(?2, name),
             description = COALESCE(?3, description),
             is_private = COALESCE(?4, is_private),
             updated_at = datetime('now')
         WHERE id = ?1",
        rusqlite::params![id, changes.name, changes.description, changes.is_private],
    )?;
    Ok(())
}

/// Deletes a dashboard. Its dataset, chart and selections cascade; comments
/// and likes keep their rows with the dashboard reference cleared.
pub fn delete_dashboard(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM dashboards WHERE id = ?1", [id])?;
    Ok(deleted > 0)
}

pub(crate) fn dashboard_from_row(row: &Row<'_>) -> rusqlite::Result<DashboardRow> {
    Ok(DashboardRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        is_private: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::db_with_user;
    use super::*;

    #[test]
    fn new_dashboard_has_defaults() {
        let db = db_with_user("u1");
        let d = db.create_dashboard("d1", "u1").unwrap();
        assert_eq!(d.name, "Untitled Dashboard");
        assert_eq!(d.description, "");
        assert!(d.is_private);
        assert_eq!(d.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn ownership_is_enforced_on_lookup() {
        let db = db_with_user("u1");
        db.create_user("u2", "other", "o@example.com", "hash").unwrap();
        db.create_dashboard("d1", "u1").unwrap();

        assert!(db.get_owned_dashboard("d1", "u1").unwrap().is_some());
        assert!(db.get_owned_dashboard("d1", "u2").unwrap().is_none());
        assert!(db.get_dashboard("d1").unwrap().is_some());
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let db = db_with_user("u1");
        db.create_dashboard("d1", "u1").unwrap();

        db.with_tx(|conn| {
            update_dashboard(
                conn,
                "d1",
                &DashboardChanges {
                    name: Some("Sales".into()),
                    is_private: Some(false),
                    ..Default::default()
                },
            )
        })
        .unwrap();

        let d = db.get_dashboard("d1").unwrap().unwrap();
        assert_eq!(d.name, "Sales");
        assert_eq!(d.description, "");
        assert!(!d.is_private);
    }

    #[test]
    fn users_are_found_by_name() {
        let db = db_with_user("u1");
        let by_name = db.get_user_by_username("user-u1").unwrap().unwrap();
        assert_eq!(by_name.id, "u1");
        assert!(db.get_user_by_username("nope").unwrap().is_none());
    }

    #[test]
    fn taken_username_is_a_constraint_violation() {
        let db = db_with_user("u1");
        let err = db.create_user("u2", "user-u1", "x@example.com", "hash").unwrap_err();
        assert!(crate::is_constraint_violation(&err));
        assert!(!crate::is_constraint_violation(&anyhow::anyhow!("other")));
    }
}
