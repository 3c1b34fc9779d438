use chrono::{DateTime, Utc};
use serde::Serialize;

/// Title given to pastes created without one.
pub const DEFAULT_TITLE: &str = "Untitled Paste";

/// Language hint given to pastes created without one.
pub const DEFAULT_LANGUAGE: &str = "plaintext";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paste {
    pub id: String,
    pub title: String,
    pub content: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Paste {
    /// Whether the paste may still be served at `now`.
    pub fn is_live(&self, now: &DateTime<Utc>) -> bool {
        is_live(self.expires_at.as_ref(), now)
    }
}

/// A create request after boundary validation, before an id is assigned.
#[derive(Debug, Clone, Default)]
pub struct NewPaste {
    pub title: Option<String>,
    pub content: String,
    pub language: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub(crate) fn is_live(expires_at: Option<&DateTime<Utc>>, now: &DateTime<Utc>) -> bool {
    match expires_at {
        Some(deadline) => deadline > now,
        None => true,
    }
}
