use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE chart_types (
                id      INTEGER PRIMARY KEY,
                name    TEXT NOT NULL UNIQUE
            );

            CREATE TABLE dashboards (
                id          TEXT PRIMARY KEY,
                user_id     TEXT REFERENCES users(id) ON DELETE SET NULL,
                name        TEXT NOT NULL DEFAULT 'Untitled Dashboard',
                description TEXT NOT NULL DEFAULT '',
                is_private  INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_dashboards_user ON dashboards(user_id, created_at);

            CREATE TABLE datasets (
                id           TEXT PRIMARY KEY,
                user_id      TEXT REFERENCES users(id) ON DELETE SET NULL,
                dashboard_id TEXT UNIQUE REFERENCES dashboards(id) ON DELETE CASCADE,
                file_handle  TEXT,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE dataset_columns (
                id          TEXT PRIMARY KEY,
                dataset_id  TEXT NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL,
                name        TEXT NOT NULL,
                data_type   TEXT NOT NULL DEFAULT 'string',
                UNIQUE(dataset_id, name)
            );

            CREATE TABLE charts (
                id           TEXT PRIMARY KEY,
                dashboard_id TEXT NOT NULL UNIQUE REFERENCES dashboards(id) ON DELETE CASCADE,
                dataset_id   TEXT REFERENCES datasets(id) ON DELETE SET NULL,
                chart_type   TEXT REFERENCES chart_types(name),
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE selected_columns (
                id          TEXT PRIMARY KEY,
                chart_id    TEXT NOT NULL REFERENCES charts(id) ON DELETE CASCADE,
                axis        TEXT NOT NULL CHECK (axis IN ('x', 'y', 'category', 'series')),
                column_id   TEXT NOT NULL REFERENCES dataset_columns(id) ON DELETE CASCADE,
                UNIQUE(chart_id, axis)
            );

            CREATE TABLE comments (
                id           TEXT PRIMARY KEY,
                user_id      TEXT REFERENCES users(id) ON DELETE SET NULL,
                dashboard_id TEXT REFERENCES dashboards(id) ON DELETE SET NULL,
                body         TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_comments_dashboard ON comments(dashboard_id, created_at);

            CREATE TABLE likes (
                id           TEXT PRIMARY KEY,
                user_id      TEXT REFERENCES users(id) ON DELETE SET NULL,
                dashboard_id TEXT REFERENCES dashboards(id) ON DELETE SET NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(user_id, dashboard_id)
            );

            CREATE INDEX idx_likes_dashboard ON likes(dashboard_id);

            -- Seed the renderable chart types
            INSERT INTO chart_types (id, name) VALUES (1, 'Bar Chart'), (2, 'Line Chart');

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
