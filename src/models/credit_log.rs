use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{new_id, normalize_optional};

/// Append-only audit entry for a credit adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditLog {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub reason: String,
    #[sqlx(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
}

impl CreditLog {
    pub fn new(user_id: impl Into<String>, amount: i64, reason: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            amount,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditLogDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub amount: i64,
    pub reason: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CreditLogDraft {
    pub fn into_log(self) -> CreditLog {
        CreditLog {
            id: normalize_optional(self.id).unwrap_or_else(new_id),
            user_id: self.user_id,
            amount: self.amount,
            reason: self.reason,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}
