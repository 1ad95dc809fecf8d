//! Core library for Notekeep — a personal note-taking application whose notes
//! mix ordered text and image segments.
//!
//! The primary entry point is [`NotesRepository`], usually built once at
//! startup through [`NotesConfig::open_repository`]. It keeps the SQLite
//! [`NoteStore`] and the managed image files of the [`AssetManager`]
//! consistent, and hands out live [`NoteFeed`]s for list and search views.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use crate::core::{
    assets::{AssetManager, FileSource, LocalFileSource, LocalManagedDir, ManagedDir},
    config::NotesConfig,
    content::{normalize_content, ContentSegment, ContentType},
    error::{NotesError, Result},
    feed::{FeedQuery, NoteFeed},
    note::{now_millis, Note, PinnedGroups},
    repository::NotesRepository,
    storage::Storage,
    store::NoteStore,
};
