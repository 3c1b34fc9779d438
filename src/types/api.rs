use serde::Deserialize;
use serde_json::Value;

use crate::expiration::{ExpirationRequest, InvalidExpiration};

/// Body of a create request; every field is optional so that a missing
/// `content` can be reported as a validation error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaste {
    pub title: Option<String>,
    pub content: Option<String>,
    pub language: Option<String>,
    #[serde(alias = "expiresIn")]
    pub expires_at: Option<ExpiresAt>,
}

/// Raw `expiresAt` value as sent by the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExpiresAt {
    /// `never`, `1h`, `1d`, `1w`, `1m`, a date or an ISO 8601 timestamp.
    Text(String),
    /// Milliseconds since the Unix epoch.
    EpochMillis(i64),
    /// Anything else; always rejected as an invalid expiration.
    Other(Value),
}

impl TryFrom<ExpiresAt> for ExpirationRequest {
    type Error = InvalidExpiration;

    fn try_from(value: ExpiresAt) -> Result<Self, Self::Error> {
        match value {
            ExpiresAt::Text(text) => ExpirationRequest::parse(&text),
            ExpiresAt::EpochMillis(millis) => ExpirationRequest::from_epoch_millis(millis),
            ExpiresAt::Other(other) => Err(InvalidExpiration(other.to_string())),
        }
    }
}
