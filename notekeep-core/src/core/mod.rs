//! Internal domain modules for the Notekeep core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod assets;
pub mod config;
pub mod content;
pub mod error;
pub mod feed;
pub mod note;
pub mod repository;
pub mod storage;
pub mod store;

#[doc(inline)]
pub use assets::{AssetManager, FileSource, LocalFileSource, LocalManagedDir, ManagedDir};
#[doc(inline)]
pub use config::NotesConfig;
#[doc(inline)]
pub use content::{normalize_content, ContentSegment, ContentType};
#[doc(inline)]
pub use error::{NotesError, Result};
#[doc(inline)]
pub use feed::{FeedQuery, NoteFeed};
#[doc(inline)]
pub use note::{now_millis, Note, PinnedGroups};
#[doc(inline)]
pub use repository::NotesRepository;
#[doc(inline)]
pub use storage::Storage;
#[doc(inline)]
pub use store::NoteStore;
