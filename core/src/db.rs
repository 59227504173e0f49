use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::CoreError;

/// Opens a SQLite file with the pragmas both bridge databases share and
/// brings its schema up to date.
pub fn open_database(path: impl AsRef<Path>, migrations: &[&str]) -> Result<Connection, CoreError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA foreign_keys = ON; \
         PRAGMA temp_store = MEMORY;",
    )?;
    apply_migrations(&conn, migrations)?;
    Ok(conn)
}

pub fn apply_migrations(conn: &Connection, migrations: &[&str]) -> Result<(), CoreError> {
    let current_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let mut version = current_version as usize;
    for (idx, sql) in migrations.iter().enumerate() {
        let next_version = idx + 1;
        if next_version <= version {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute_batch(&format!("PRAGMA user_version = {};", next_version))?;
        version = next_version;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{MESSAGE_MIGRATIONS, SESSION_MIGRATIONS};

    #[test]
    fn migrations_create_schema() {
        let conn = Connection::open_in_memory().expect("memory db");
        apply_migrations(&conn, MESSAGE_MIGRATIONS).expect("migrate");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('chats', 'messages');",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(count, 2);
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().expect("memory db");
        apply_migrations(&conn, SESSION_MIGRATIONS).expect("first");
        apply_migrations(&conn, SESSION_MIGRATIONS).expect("second");
        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .expect("version");
        assert_eq!(version, SESSION_MIGRATIONS.len() as i64);
    }

    #[test]
    fn open_database_creates_parent_dir() {
        let dir = tempfile::tempdir().expect("temp");
        let path = dir.path().join("nested").join("messages.db");
        let conn = open_database(&path, MESSAGE_MIGRATIONS).expect("open");
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .expect("pragma");
        assert_eq!(fk, 1);
        assert!(path.exists());
    }
}
