//! Caller-facing note operations.
//!
//! [`NotesRepository`] is the only type the UI layer talks to. It layers the
//! asset rules on top of [`NoteStore`]: images are imported before the write
//! that references them, and files are removed only after the write that
//! dropped them has committed. A crash between the two steps can leave an
//! unused file behind, never a segment pointing at a missing one.
//!
//! Add, edit and delete hold the repository's write lock from their first
//! read until the last file is removed, so one writer's cleanup never runs
//! between another writer's import and commit.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    normalize_content, AssetManager, ContentSegment, Note, NoteFeed, NoteStore, NotesError, Result,
};

pub struct NotesRepository {
    store: Arc<NoteStore>,
    assets: AssetManager,
    writes: Mutex<()>,
}

impl NotesRepository {
    pub fn new(store: Arc<NoteStore>, assets: AssetManager) -> Self {
        Self { store, assets, writes: Mutex::new(()) }
    }

    pub fn store(&self) -> &Arc<NoteStore> {
        &self.store
    }

    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    /// Creates a note.
    ///
    /// Blank text segments are dropped and external images are copied into
    /// managed storage before anything is written. The header and segments
    /// are then written in one transaction; the new id shows up in
    /// subsequent reads and feeds.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotesError::ImageImport`] if an image cannot be read or
    /// a managed image no longer exists; nothing is stored in that case. Database failures are returned as-is
    /// after the images imported by this call have been removed again.
    pub fn add_note(
        &self,
        title: &str,
        content: Vec<ContentSegment>,
        is_pinned: bool,
        updated_at: i64,
    ) -> Result<()> {
        let _writes = self.lock_writes()?;
        let (content, imported) = self.assets.import_content(normalize_content(content))?;
        let note = Note {
            id: 0,
            title: title.to_string(),
            content,
            updated_at,
            is_pinned,
        };

        match self.store.insert_note_with_content(&note) {
            Ok(id) => {
                log::debug!("added note {id} with {} segments", note.content.len());
                Ok(())
            }
            Err(e) => {
                self.assets.discard(&imported);
                Err(e)
            }
        }
    }

    /// Replaces the title, timestamp, pin state and full content of an
    /// existing note.
    ///
    /// Managed images present in the stored version but absent from `note`
    /// are removed once the new version has committed, unless another note
    /// still references them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotesError::NotFound`] if the note does not exist, and
    /// [`crate::NotesError::ImageImport`] if `note` refers to a managed image
    /// that has since been removed. On any failure no previously stored image
    /// is touched.
    pub fn edit_note(&self, note: Note) -> Result<()> {
        let _writes = self.lock_writes()?;
        let old = self.store.get_note(note.id)?;

        let (content, imported) = self.assets.import_content(normalize_content(note.content))?;
        let note = Note { content, ..note };

        let kept: HashSet<&str> = note.image_references().into_iter().collect();
        let removed = self.managed_images(old.image_references().into_iter().filter(|r| !kept.contains(r)));

        if let Err(e) = self.store.replace_note(&note) {
            self.assets.discard(&imported);
            return Err(e);
        }
        log::debug!("edited note {}; {} images dropped", note.id, removed.len());

        self.release_images(&removed);
        Ok(())
    }

    /// Deletes a note and then every managed image it owned.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotesError::NotFound`] if the note does not exist.
    pub fn delete_note(&self, id: i64) -> Result<()> {
        let _writes = self.lock_writes()?;
        let old = self.store.get_note(id)?;
        let owned = self.managed_images(old.image_references().into_iter());

        self.store.delete_note(id)?;

        self.release_images(&owned);
        Ok(())
    }

    /// Flips the pinned flag of a note.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotesError::NotFound`] if the note does not exist.
    pub fn switch_pinned_status(&self, id: i64) -> Result<()> {
        self.store.switch_pinned(id)
    }

    pub fn get_note(&self, id: i64) -> Result<Note> {
        self.store.get_note(id)
    }

    /// Live list of all notes, most recently updated first.
    pub fn get_all_notes(&self) -> Result<NoteFeed> {
        self.store.list_all()
    }

    /// Live list of notes whose title or text contains `query`.
    pub fn search_notes(&self, query: &str) -> Result<NoteFeed> {
        self.store.search(query)
    }

    /// Feed for a search box: a blank query lists everything, anything else
    /// searches.
    pub fn notes_for_query(&self, query: &str) -> Result<NoteFeed> {
        if query.trim().is_empty() {
            self.get_all_notes()
        } else {
            self.search_notes(query)
        }
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| NotesError::StoreUnavailable("repository lock poisoned".to_string()))
    }

    /// Distinct managed references from `references`, in first-seen order.
    fn managed_images<'a>(&self, references: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut seen = HashSet::new();
        references
            .filter(|r| self.assets.is_managed(r) && seen.insert(*r))
            .map(str::to_string)
            .collect()
    }

    /// Removes the files among `candidates` that no stored note references.
    ///
    /// Runs after the write that dropped them has committed, so failures here
    /// are logged and otherwise ignored.
    fn release_images(&self, candidates: &[String]) {
        if candidates.is_empty() {
            return;
        }
        match self.store.unreferenced_images(candidates) {
            Ok(orphans) => self.assets.discard(&orphans),
            Err(e) => log::warn!("skipping image cleanup for {} files: {e}", candidates.len()),
        }
    }
}
