//! Note content segments and their storage encoding.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// One ordered unit of a note's content.
///
/// Serialised as an internally tagged object so that front-ends can switch
/// on `type`:
///
/// ```rust
/// use notekeep_core::ContentSegment;
///
/// let json = serde_json::to_string(&ContentSegment::text("hi")).unwrap();
/// assert_eq!(json, r#"{"type":"text","body":"hi"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentSegment {
    /// A run of plain text.
    Text { body: String },
    /// A reference (path or URI) to an image, resolved by the asset manager.
    Image { reference: String },
}

impl ContentSegment {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    pub fn image(reference: impl Into<String>) -> Self {
        Self::Image { reference: reference.into() }
    }

    /// True for a text segment holding nothing but whitespace.
    ///
    /// Image segments are never blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text { body } => body.trim().is_empty(),
            Self::Image { .. } => false,
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Text { .. } => ContentType::Text,
            Self::Image { .. } => ContentType::Image,
        }
    }

    /// The value stored in the `content` column: the body for text, the
    /// reference for images.
    pub fn payload(&self) -> &str {
        match self {
            Self::Text { body } => body,
            Self::Image { reference } => reference,
        }
    }

    /// Rebuilds a segment from its `content_type` and `content` columns.
    pub fn from_parts(content_type: ContentType, payload: String) -> Self {
        match content_type {
            ContentType::Text => Self::Text { body: payload },
            ContentType::Image => Self::Image { reference: payload },
        }
    }
}

/// Discriminant stored in the `content.content_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Text,
    Image,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
        }
    }
}

impl ToSql for ContentType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ContentType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "TEXT" => Ok(Self::Text),
            "IMAGE" => Ok(Self::Image),
            other => Err(FromSqlError::Other(
                format!("unknown content type '{other}'").into(),
            )),
        }
    }
}

/// Drops blank text segments, keeping every image segment in place.
///
/// Editors keep a trailing empty text segment around so the user can keep
/// typing after an image; it must never reach storage.
pub fn normalize_content(content: Vec<ContentSegment>) -> Vec<ContentSegment> {
    content.into_iter().filter(|s| !s.is_blank()).collect()
}
