//! Error types for the Notekeep core library.

use thiserror::Error;

/// All errors that can occur within the Notekeep core library.
#[derive(Debug, Error)]
pub enum NotesError {
    /// A note ID was requested that does not exist in the database.
    #[error("Note not found: {0}")]
    NotFound(i64),

    /// A write was rejected by a table constraint, e.g. segments inserted
    /// for a note that does not exist.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// An external image could not be copied into managed storage.
    #[error("Failed to import image '{reference}': {source}")]
    ImageImport {
        reference: String,
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation on the managed image directory failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The notes database could not be opened, validated or locked.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Any other SQLite failure.
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Settings could not be (de)serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`NotesError`].
pub type Result<T> = std::result::Result<T, NotesError>;

impl From<rusqlite::Error> for NotesError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, ref msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            rusqlite::Error::SqliteFailure(ref err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::CannotOpen
                        | rusqlite::ErrorCode::NotADatabase
                        | rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::StoreUnavailable(e.to_string())
            }
            other => Self::Database(other),
        }
    }
}

impl NotesError {
    /// Returns true for the I/O family of failures (import or managed-dir access).
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Self::ImageImport { .. } | Self::Io(_))
    }

    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(_) => "Note no longer exists".to_string(),
            Self::ConstraintViolation(_) => "Failed to save note content".to_string(),
            Self::ImageImport { .. } => "Could not read the selected image".to_string(),
            Self::Io(e) => format!("File error: {e}"),
            Self::StoreUnavailable(_) => "Notes storage is not available".to_string(),
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::Json(e) => format!("Settings format error: {e}"),
        }
    }
}
