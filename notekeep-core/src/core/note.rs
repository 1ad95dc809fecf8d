use serde::{Deserialize, Serialize};

use crate::ContentSegment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Assigned by the store; `0` marks a note that has not been saved yet.
    pub id: i64,
    pub title: String,
    pub content: Vec<ContentSegment>,
    /// Epoch milliseconds, supplied by the caller on every create and edit.
    pub updated_at: i64,
    pub is_pinned: bool,
}

impl Note {
    /// True when the note has a non-blank title and at least one non-blank
    /// segment. The store accepts unsavable notes; editors check this first.
    pub fn is_savable(&self) -> bool {
        !self.title.trim().is_empty() && self.content.iter().any(|s| !s.is_blank())
    }

    /// Image references in content order.
    pub fn image_references(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|s| match s {
                ContentSegment::Image { reference } => Some(reference.as_str()),
                ContentSegment::Text { .. } => None,
            })
            .collect()
    }
}

/// A note list split into the pinned group and everything else.
///
/// Both groups keep the order of the list they were built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedGroups {
    pub pinned: Vec<Note>,
    pub others: Vec<Note>,
}

impl PinnedGroups {
    pub fn from_notes(notes: Vec<Note>) -> Self {
        let (pinned, others) = notes.into_iter().partition(|n| n.is_pinned);
        Self { pinned, others }
    }
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
