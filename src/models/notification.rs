use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{new_id, normalize_optional};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "info" => Ok(NotificationKind::Info),
            "success" => Ok(NotificationKind::Success),
            "warning" => Ok(NotificationKind::Warning),
            other => Err(AppError::BadRequest(format!(
                "unknown notification type `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub read: bool,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: impl Into<String>, text: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            text: text.into(),
            read: false,
            kind,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NotificationDraft {
    pub fn into_notification(self) -> Notification {
        Notification {
            id: normalize_optional(self.id).unwrap_or_else(new_id),
            user_id: self.user_id,
            text: self.text,
            read: self.read,
            kind: self.kind,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}
