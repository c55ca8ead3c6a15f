pub mod credit_log;
pub mod message;
pub mod notification;
pub mod study_group;
pub mod trip;
pub mod user;

use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trims the value and drops it entirely when nothing is left.
pub fn normalize_optional(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
