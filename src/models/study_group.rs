use serde::{Deserialize, Serialize};

use super::{new_id, normalize_optional};

pub const DEFAULT_MAX_MEMBERS: i64 = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudyGroup {
    pub id: String,
    pub train_number: String,
    pub train_line: String,
    pub departure_time: String,
    pub subject: String,
    pub from: String,
    pub creator_id: String,
    pub members: Vec<String>,
    pub max_members: i64,
}

impl StudyGroup {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|id| id == user_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() as i64 >= self.max_members
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyGroupDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub train_number: String,
    #[serde(default)]
    pub train_line: String,
    pub departure_time: String,
    pub subject: String,
    #[serde(default)]
    pub from: String,
    pub creator_id: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub max_members: Option<i64>,
}

impl StudyGroupDraft {
    /// The creator always counts as the first member.
    pub fn into_group(self) -> StudyGroup {
        let mut members = self.members;
        if !members.iter().any(|id| *id == self.creator_id) {
            members.insert(0, self.creator_id.clone());
        }
        StudyGroup {
            id: normalize_optional(self.id).unwrap_or_else(new_id),
            train_number: self.train_number,
            train_line: self.train_line,
            departure_time: self.departure_time,
            subject: self.subject.trim().to_string(),
            from: self.from,
            creator_id: self.creator_id,
            members,
            max_members: self.max_members.unwrap_or(DEFAULT_MAX_MEMBERS),
        }
    }
}
