//! Transactional note persistence and live queries over a [`Storage`].

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};

use crate::core::feed::{FeedQuery, FeedRegistry};
use crate::{ContentSegment, ContentType, Note, NoteFeed, NotesError, Result, Storage};

/// The process-wide note store.
///
/// Wraps a single SQLite connection behind a mutex: every write runs in one
/// transaction while holding it, so two writers never interleave statements
/// on the same note. After each commit, and before the lock is released,
/// every live [`NoteFeed`] receives a fresh snapshot.
///
/// Construct one at startup and share it by `Arc`.
pub struct NoteStore {
    storage: Mutex<Storage>,
    feeds: Mutex<FeedRegistry>,
}

impl NoteStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Mutex::new(storage),
            feeds: Mutex::new(FeedRegistry::default()),
        }
    }

    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Storage::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Storage::open_in_memory()?))
    }

    /// Upserts the note header. An id of `0` inserts and returns the new id;
    /// any other id is preserved and existing segments are left alone.
    pub fn insert_note(&self, note: &Note) -> Result<i64> {
        self.write(|conn| insert_note(conn, note))
    }

    /// Appends `segments` to `note_id` at positions `0..n-1`.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::ConstraintViolation`] if `note_id` does not exist.
    pub fn insert_segments(&self, note_id: i64, segments: &[ContentSegment]) -> Result<()> {
        self.write(|conn| insert_segments(conn, note_id, segments))
    }

    pub fn delete_segments(&self, note_id: i64) -> Result<()> {
        self.write(|conn| delete_segments(conn, note_id))
    }

    /// Deletes the note header; its segments go with it.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::NotFound`] if no note has this id.
    pub fn delete_note(&self, note_id: i64) -> Result<()> {
        self.write(|conn| delete_note(conn, note_id))
    }

    /// Writes a new note header and its content in one transaction and
    /// returns the assigned id.
    pub fn insert_note_with_content(&self, note: &Note) -> Result<i64> {
        self.write(|conn| {
            let id = insert_note(conn, &Note { id: 0, ..note.clone() })?;
            insert_segments(conn, id, &note.content)?;
            Ok(id)
        })
    }

    /// Replaces the header and the full content of an existing note in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::NotFound`] if the note no longer exists; nothing
    /// is written in that case.
    pub fn replace_note(&self, note: &Note) -> Result<()> {
        self.write(|conn| {
            if !note_exists(conn, note.id)? {
                return Err(NotesError::NotFound(note.id));
            }
            insert_note(conn, note)?;
            delete_segments(conn, note.id)?;
            insert_segments(conn, note.id, &note.content)
        })
    }

    /// Flips `is_pinned` in place.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::NotFound`] if no note has this id.
    pub fn switch_pinned(&self, note_id: i64) -> Result<()> {
        self.write(|conn| {
            let changed = conn.execute(
                "UPDATE notes SET is_pinned = NOT is_pinned WHERE id = ?1",
                [note_id],
            )?;
            if changed == 0 {
                return Err(NotesError::NotFound(note_id));
            }
            Ok(())
        })
    }

    /// Fetches a single note with its content in order.
    ///
    /// # Errors
    ///
    /// Returns [`NotesError::NotFound`] if no note has this id.
    pub fn get_note(&self, note_id: i64) -> Result<Note> {
        let storage = self.lock_storage()?;
        get_note(storage.connection(), note_id)
    }

    /// Live list of every note, newest `updated_at` first.
    pub fn list_all(&self) -> Result<NoteFeed> {
        self.subscribe(FeedQuery::All)
    }

    /// Live list of notes whose title or any text segment contains `query`.
    ///
    /// Matching is a case-sensitive substring test; image references are
    /// never searched.
    pub fn search(&self, query: &str) -> Result<NoteFeed> {
        self.subscribe(FeedQuery::Search(query.to_string()))
    }

    /// Current snapshot of [`list_all`](Self::list_all).
    pub fn all_notes(&self) -> Result<Vec<Note>> {
        let storage = self.lock_storage()?;
        query_notes(storage.connection(), &FeedQuery::All)
    }

    /// Current snapshot of [`search`](Self::search).
    pub fn search_notes(&self, query: &str) -> Result<Vec<Note>> {
        let storage = self.lock_storage()?;
        query_notes(storage.connection(), &FeedQuery::Search(query.to_string()))
    }

    /// Returns the references from `candidates` that no segment of any note
    /// points at any more, in the order given.
    pub fn unreferenced_images(&self, candidates: &[String]) -> Result<Vec<String>> {
        let storage = self.lock_storage()?;
        let conn = storage.connection();
        let mut stmt = conn.prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM content WHERE content_type = 'IMAGE' AND content = ?1)",
        )?;
        let mut unreferenced = Vec::new();
        for reference in candidates {
            let in_use: bool =
                stmt.query_row([reference], |row| row.get(0))?;
            if !in_use {
                unreferenced.push(reference.clone());
            }
        }
        Ok(unreferenced)
    }

    /// Number of feeds currently registered, including ones dropped since
    /// the last write or subscription.
    pub fn feed_count(&self) -> usize {
        self.feeds.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// Runs `f` inside one transaction, commits, then refreshes all feeds.
    ///
    /// Any error from `f` rolls the transaction back and publishes nothing.
    fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut storage = self.lock_storage()?;
        let tx = storage.connection_mut().transaction()?;
        let out = f(&*tx)?;
        tx.commit()?;
        self.publish(storage.connection());
        Ok(out)
    }

    fn subscribe(&self, query: FeedQuery) -> Result<NoteFeed> {
        let storage = self.lock_storage()?;
        let initial = query_notes(storage.connection(), &query)?;
        let mut feeds = self.lock_feeds()?;
        Ok(feeds.subscribe(query, initial))
    }

    fn publish(&self, conn: &Connection) {
        match self.feeds.lock() {
            Ok(mut feeds) => feeds.publish(|query| query_notes(conn, query)),
            Err(_) => log::error!("feed registry lock poisoned; skipping refresh"),
        }
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, Storage>> {
        self.storage
            .lock()
            .map_err(|_| NotesError::StoreUnavailable("storage lock poisoned".to_string()))
    }

    fn lock_feeds(&self) -> Result<MutexGuard<'_, FeedRegistry>> {
        self.feeds
            .lock()
            .map_err(|_| NotesError::StoreUnavailable("feed lock poisoned".to_string()))
    }
}

// ── Statements ────────────────────────────────────────────────
//
// These take a plain `&Connection` so that several of them can share the
// caller's transaction (a `Transaction` derefs to `Connection`). None of them
// opens a transaction of its own.

/// Upserts the header row of `note`.
///
/// An id of `0` inserts a new row and returns the id SQLite assigned. Any
/// other id updates that row in place, or inserts it with that id if it is
/// missing, and returns it unchanged. Existing segments are left alone.
fn insert_note(conn: &Connection, note: &Note) -> Result<i64> {
    let id = conn.query_row(
        "INSERT INTO notes (id, title, updated_at, is_pinned)
         VALUES (NULLIF(?1, 0), ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             updated_at = excluded.updated_at,
             is_pinned = excluded.is_pinned
         RETURNING id",
        rusqlite::params![note.id, note.title, note.updated_at, note.is_pinned],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Inserts `segments` for `note_id` at positions `0..n-1`.
///
/// Callers replacing content must call [`delete_segments`] first.
///
/// # Errors
///
/// Returns [`NotesError::ConstraintViolation`] if `note_id` does not exist.
fn insert_segments(conn: &Connection, note_id: i64, segments: &[ContentSegment]) -> Result<()> {
    if !note_exists(conn, note_id)? {
        return Err(NotesError::ConstraintViolation(format!(
            "content references missing note {note_id}"
        )));
    }
    let mut stmt = conn.prepare_cached(
        "INSERT INTO content (note_id, content_type, content, position) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (position, segment) in segments.iter().enumerate() {
        stmt.execute(rusqlite::params![
            note_id,
            segment.content_type(),
            segment.payload(),
            position as i64,
        ])?;
    }
    log::debug!("wrote {} segments for note {note_id}", segments.len());
    Ok(())
}

fn delete_segments(conn: &Connection, note_id: i64) -> Result<()> {
    conn.execute("DELETE FROM content WHERE note_id = ?1", [note_id])?;
    Ok(())
}

/// Deletes the header row; `ON DELETE CASCADE` removes the segments.
fn delete_note(conn: &Connection, note_id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM notes WHERE id = ?1", [note_id])?;
    // SQLite DELETE silently affects zero rows for an unknown id.
    if deleted == 0 {
        return Err(NotesError::NotFound(note_id));
    }
    log::debug!("deleted note {note_id}");
    Ok(())
}

fn get_note(conn: &Connection, note_id: i64) -> Result<Note> {
    let row = conn
        .query_row(
            "SELECT id, title, updated_at, is_pinned FROM notes WHERE id = ?1",
            [note_id],
            map_note_row,
        )
        .optional()?
        .ok_or(NotesError::NotFound(note_id))?;
    note_from_row(conn, row)
}

/// Runs `query` and returns matching notes ordered by `updated_at` DESC,
/// ties broken by `id` DESC.
fn query_notes(conn: &Connection, query: &FeedQuery) -> Result<Vec<Note>> {
    let rows = match query {
        FeedQuery::All => {
            let mut stmt = conn.prepare_cached(
                "SELECT id, title, updated_at, is_pinned FROM notes
                 ORDER BY updated_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([], map_note_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        FeedQuery::Search(text) => {
            // instr() rather than LIKE: LIKE folds ASCII case and treats % and _
            // as wildcards.
            let mut stmt = conn.prepare_cached(
                "SELECT n.id, n.title, n.updated_at, n.is_pinned FROM notes n
                 WHERE instr(n.title, ?1) > 0
                    OR EXISTS (
                        SELECT 1 FROM content c
                        WHERE c.note_id = n.id
                          AND c.content_type = ?2
                          AND instr(c.content, ?1) > 0
                    )
                 ORDER BY n.updated_at DESC, n.id DESC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![text, ContentType::Text], map_note_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };

    rows.into_iter().map(|row| note_from_row(conn, row)).collect()
}

fn note_exists(conn: &Connection, note_id: i64) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1)",
        [note_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn load_segments(conn: &Connection, note_id: i64) -> Result<Vec<ContentSegment>> {
    let mut stmt = conn.prepare_cached(
        "SELECT content_type, content FROM content WHERE note_id = ?1 ORDER BY position",
    )?;
    let segments = stmt
        .query_map([note_id], |row| {
            Ok(ContentSegment::from_parts(row.get(0)?, row.get(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(segments)
}

/// Raw `notes` row: id, title, updated_at, is_pinned.
type NoteRow = (i64, String, i64, bool);

fn map_note_row(row: &rusqlite::Row) -> rusqlite::Result<NoteRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn note_from_row(conn: &Connection, (id, title, updated_at, is_pinned): NoteRow) -> Result<Note> {
    Ok(Note {
        id,
        title,
        content: load_segments(conn, id)?,
        updated_at,
        is_pinned,
    })
}
