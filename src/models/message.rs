use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{new_id, normalize_optional};

/// A chat line. `trip_id` is the thread key and holds either a trip id or
/// a study-group id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub trip_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    #[sqlx(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub trip_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MessageDraft {
    pub fn into_message(self) -> Message {
        Message {
            id: normalize_optional(self.id).unwrap_or_else(new_id),
            trip_id: self.trip_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            text: self.text,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}
