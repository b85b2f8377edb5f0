use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_blog",
    include_str!("../../migrations/001_blog.sql"),
)];

/// Per-connection settings. `foreign_keys` is connection-scoped in SQLite,
/// so every pooled connection needs it.
fn configure(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )
}

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(configure);
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

/// Single-connection in-memory pool. Each in-memory connection is its own
/// database, hence `max_size(1)`.
pub fn memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(configure);
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated_pool() -> DbPool {
        let pool = memory_pool().unwrap();
        run_migrations(&pool).unwrap();
        pool
    }

    fn insert_post(conn: &rusqlite::Connection, slug: &str) -> i64 {
        conn.execute(
            "INSERT INTO posts (slug, title, content, category, published)
             VALUES (?1, ?1, 'body', 'rust', 1)",
            params![slug],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn every_pooled_connection_enforces_foreign_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = create_pool(&tmp.path().join("fk.db")).unwrap();

        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        for conn in [&a, &b] {
            let enabled: bool = conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                .unwrap();
            assert!(enabled);
        }
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = migrated_pool();
        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        assert!(tables.contains(&"posts".to_string()));
        assert!(tables.contains(&"post_likes".to_string()));
        assert!(tables.contains(&"post_comments".to_string()));
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = migrated_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn likes_are_unique_per_post_and_ip() {
        let pool = migrated_pool();
        let conn = pool.get().unwrap();
        let post_id = insert_post(&conn, "unique-likes");

        conn.execute(
            "INSERT INTO post_likes (post_id, user_ip) VALUES (?1, '198.51.100.1')",
            params![post_id],
        )
        .unwrap();
        let again = conn.execute(
            "INSERT INTO post_likes (post_id, user_ip) VALUES (?1, '198.51.100.1')",
            params![post_id],
        );
        assert!(again.is_err());

        // A different client may like the same post
        conn.execute(
            "INSERT INTO post_likes (post_id, user_ip) VALUES (?1, '198.51.100.2')",
            params![post_id],
        )
        .unwrap();
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = migrated_pool();
        let conn = pool.get().unwrap();

        let result = conn.execute(
            "INSERT INTO post_comments (post_id, user_name, content) VALUES (999, 'x', 'y')",
            [],
        );
        assert!(result.is_err());
    }
}
