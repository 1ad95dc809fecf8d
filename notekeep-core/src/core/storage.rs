use crate::{NotesError, Result};
use rusqlite::Connection;
use std::path::Path;

pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens the notes database at `path`, creating the file and schema if
    /// they do not exist yet, then validates and migrates it.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::StoreUnavailable`] if the file cannot be opened
    /// or is not a notes database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| {
            NotesError::StoreUnavailable(format!(
                "cannot open {}: {e}",
                path.as_ref().display()
            ))
        })?;
        log::info!("opened notes database at {}", path.as_ref().display());
        Self::init(conn)
    }

    /// Opens a private in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| NotesError::StoreUnavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Foreign keys are per-connection in SQLite and off by default.
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| NotesError::StoreUnavailable(e.to_string()))?;

        migrate(&conn)?;

        conn.execute_batch(include_str!("schema.sql"))
            .map_err(|e| NotesError::StoreUnavailable(format!("not a notes database: {e}")))?;

        // Validate database structure
        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table'
             AND name IN ('notes', 'content')",
            [],
            |row| row.get(0),
        )?;

        if table_count != 2 {
            return Err(NotesError::StoreUnavailable(
                "Not a valid notes database".to_string(),
            ));
        }

        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Brings a database written by an older build up to the current schema.
fn migrate(conn: &Connection) -> Result<()> {
    let notes_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='notes'",
            [],
            |row| row.get::<_, i64>(0).map(|count| count > 0),
        )
        .map_err(|e| NotesError::StoreUnavailable(format!("not a notes database: {e}")))?;

    if !notes_exists {
        return Ok(());
    }

    // Migrate: add is_pinned column if it doesn't exist
    let column_exists: bool = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('notes') WHERE name='is_pinned'",
        [],
        |row| row.get::<_, i64>(0).map(|count| count > 0),
    )?;

    if !column_exists {
        log::info!("migrating notes table: adding is_pinned column");
        conn.execute(
            "ALTER TABLE notes ADD COLUMN is_pinned INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }

    Ok(())
}
