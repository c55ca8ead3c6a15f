use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Driver,
    #[default]
    Passenger,
    Both,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Driver => "driver",
            UserRole::Passenger => "passenger",
            UserRole::Both => "both",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "driver" => Ok(UserRole::Driver),
            "passenger" => Ok(UserRole::Passenger),
            "both" => Ok(UserRole::Both),
            other => Err(AppError::BadRequest(format!("unknown role `{other}`"))),
        }
    }
}

/// A commuter. The id is the normalized email address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub accessibility_needs: Vec<String>,
    #[serde(default)]
    pub credits: i64,
    #[serde(skip)]
    pub password_hash: Option<String>,
}

/// Body of `POST /api/users`. The password is write-only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub accessibility_needs: Vec<String>,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: String,
    pub name: String,
    pub credits: i64,
    pub level: i64,
}

impl LeaderboardEntry {
    pub fn rank_users(users: Vec<User>) -> Vec<Self> {
        users
            .into_iter()
            .enumerate()
            .map(|(idx, user)| LeaderboardEntry {
                rank: idx + 1,
                level: level_for(user.credits),
                id: user.id,
                name: user.name,
                credits: user.credits,
            })
            .collect()
    }
}

/// One level per thousand credits, starting at level 1.
pub fn level_for(credits: i64) -> i64 {
    credits.max(0) / 1000 + 1
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_start_at_one_and_step_per_thousand() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(999), 1);
        assert_eq!(level_for(1000), 2);
        assert_eq!(level_for(2550), 3);
        assert_eq!(level_for(-120), 1);
    }

    #[test]
    fn password_never_serialized() {
        let user = User {
            id: "ada@uni.it".into(),
            name: "Ada".into(),
            role: UserRole::Both,
            skills: vec!["Analisi 1".into()],
            accessibility_needs: Vec::new(),
            credits: 500,
            password_hash: Some("$argon2id$secret".into()),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["accessibilityNeeds"], serde_json::json!([]));
        assert_eq!(json["role"], "both");
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada.L@Uni.IT "), "ada.l@uni.it");
    }
}
