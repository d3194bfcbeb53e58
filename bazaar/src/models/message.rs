use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One message of the joined conversation, as the server reports it. Whose
/// side it renders on is already resolved to the current viewer.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub content: String,
    pub is_current_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A message ready for rendering. The avatar is derived from the session's
/// two profile images at read time, never stored per message, so a changed
/// avatar applies to the whole log at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView<'a> {
    pub content: &'a str,
    pub is_current_user: bool,
    pub sender_image: Option<&'a str>,
}
