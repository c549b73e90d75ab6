use crate::Database;
use crate::models::{CommentRow, PublicDashboardRow};
use crate::queries::dashboard_from_row;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Likes --

    /// Toggle a like: removes it if present, inserts it if not.
    /// Returns (liked, like_count) as seen inside the same transaction.
    pub fn toggle_like(&self, id: &str, user_id: &str, dashboard_id: &str) -> Result<(bool, i64)> {
        self.with_tx(|conn| {
            let removed = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND dashboard_id = ?2",
                (user_id, dashboard_id),
            )?;

            let liked = if removed == 0 {
                conn.execute(
                    "INSERT INTO likes (id, user_id, dashboard_id) VALUES (?1, ?2, ?3)",
                    (id, user_id, dashboard_id),
                )?;
                true
            } else {
                false
            };

            Ok((liked, like_count(conn, dashboard_id)?))
        })
    }

    pub fn like_count(&self, dashboard_id: &str) -> Result<i64> {
        self.with_conn(|conn| like_count(conn, dashboard_id))
    }

    pub fn has_liked(&self, user_id: &str, dashboard_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM likes WHERE user_id = ?1 AND dashboard_id = ?2",
                (user_id, dashboard_id),
                |r| r.get(0),
            )?;
            Ok(n > 0)
        })
    }

    // -- Comments --

    pub fn add_comment(&self, id: &str, user_id: &str, dashboard_id: &str, body: &str) -> Result<CommentRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, user_id, dashboard_id, body) VALUES (?1, ?2, ?3, ?4)",
                (id, user_id, dashboard_id, body),
            )?;
            let row = conn.query_row(
                &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
                [id],
                comment_from_row,
            )?;
            Ok(row)
        })
    }

    /// Comments on a dashboard, oldest first, with author usernames.
    pub fn list_comments(&self, dashboard_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{COMMENT_SELECT} WHERE c.dashboard_id = ?1 ORDER BY c.created_at, c.rowid"
            ))?;
            let rows = stmt
                .query_map([dashboard_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Public listing --

    /// Public dashboards with their like and comment counts.
    ///
    /// Each count is aggregated in its own subquery before joining, so likes
    /// and comments never multiply each other.
    pub fn list_public_dashboards(&self) -> Result<Vec<PublicDashboardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, d.user_id, d.name, d.description, d.is_private, d.created_at, d.updated_at,
                        COALESCE(l.cnt, 0), COALESCE(c.cnt, 0)
                 FROM dashboards d
                 LEFT JOIN (SELECT dashboard_id, COUNT(*) AS cnt FROM likes GROUP BY dashboard_id) l
                     ON l.dashboard_id = d.id
                 LEFT JOIN (SELECT dashboard_id, COUNT(*) AS cnt FROM comments GROUP BY dashboard_id) c
                     ON c.dashboard_id = d.id
                 WHERE d.is_private = 0
                 ORDER BY d.created_at DESC, d.id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(PublicDashboardRow {
                        dashboard: dashboard_from_row(row)?,
                        like_count: row.get(7)?,
                        comment_count: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

const COMMENT_SELECT: &str = "SELECT c.id, c.user_id, u.username, c.dashboard_id, c.body, c.created_at
     FROM comments c
     LEFT JOIN users u ON c.user_id = u.id";

fn like_count(conn: &Connection, dashboard_id: &str) -> Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM likes WHERE dashboard_id = ?1",
        [dashboard_id],
        |r| r.get(0),
    )?;
    Ok(n)
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_username: row.get(2)?,
        dashboard_id: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
    })
}
