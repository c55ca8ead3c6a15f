//! Storage seam. Handlers and workflows only see [`Repository`]; the
//! concrete SQLite or Postgres implementation is picked at startup from
//! the database URL (see [`crate::db::connect`]).

pub mod postgres;
pub mod rows;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult},
    models::{
        credit_log::CreditLog, message::Message, notification::Notification,
        study_group::StudyGroup, trip::Trip, user::User,
    },
};

pub use postgres::PostgresRepository;
pub use sqlite::SqliteRepository;

pub type DynRepository = Arc<dyn Repository>;

/// Turns a unique-key violation into a conflict carrying `message`.
pub(crate) fn unique_violation_as_conflict(
    err: sqlx::Error,
    message: impl Into<String>,
) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return AppError::Conflict(message.into());
        }
    }
    AppError::Database(err)
}

/// A seat change on a trip, committed only if the row still holds the
/// seats and passenger list of `expected`.
#[derive(Debug, Clone)]
pub struct TripUpdate {
    pub expected: Trip,
    pub seats_available: i64,
    pub passenger_ids: Vec<String>,
    pub credit: Option<CreditLog>,
    pub notifications: Vec<Notification>,
}

/// Deletion of a trip, committed only if its passenger list still matches
/// `expected` so that every notified passenger really was on board.
#[derive(Debug, Clone)]
pub struct TripRemoval {
    pub expected: Trip,
    pub credit: Option<CreditLog>,
    pub notifications: Vec<Notification>,
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn find_user(&self, id: &str) -> AppResult<Option<User>>;
    /// Inserts or replaces the user. A `None` password hash keeps the
    /// stored one.
    async fn upsert_user(&self, user: &User) -> AppResult<()>;
    /// Plain insert; an existing id is a [`AppError::Conflict`].
    async fn insert_user(&self, user: &User) -> AppResult<()>;
    /// Atomic `credits = credits + amount`; `None` when the user is unknown.
    async fn adjust_credits(&self, user_id: &str, amount: i64) -> AppResult<Option<User>>;
    /// Applies the entry's amount and appends it to the log in one
    /// transaction.
    async fn record_credit(&self, entry: &CreditLog) -> AppResult<Option<User>>;
    async fn top_users(&self, limit: i64) -> AppResult<Vec<User>>;

    async fn list_trips(&self) -> AppResult<Vec<Trip>>;
    async fn find_trip(&self, id: &str) -> AppResult<Option<Trip>>;
    async fn upsert_trip(&self, trip: &Trip) -> AppResult<()>;
    /// Stores a newly offered trip together with the driver's bonus.
    /// `false`, with nothing written, when the driver does not exist.
    async fn insert_offered_trip(&self, trip: &Trip, bonus: &CreditLog) -> AppResult<bool>;
    /// `false` when the trip changed (or vanished) since it was read.
    async fn apply_trip_update(&self, update: &TripUpdate) -> AppResult<bool>;
    async fn apply_trip_removal(&self, removal: &TripRemoval) -> AppResult<bool>;

    /// Newest first.
    async fn list_notifications(&self, user_id: &str) -> AppResult<Vec<Notification>>;
    async fn insert_notification(&self, notification: &Notification) -> AppResult<()>;
    /// Returns the owner of the notification, `None` when it is unknown.
    async fn mark_notification_read(&self, id: &str) -> AppResult<Option<String>>;

    /// Oldest first.
    async fn list_messages(&self, thread_id: &str) -> AppResult<Vec<Message>>;
    async fn insert_message(&self, message: &Message) -> AppResult<()>;

    async fn list_credit_logs(&self, user_id: &str) -> AppResult<Vec<CreditLog>>;
    async fn insert_credit_log(&self, entry: &CreditLog) -> AppResult<()>;

    async fn list_study_groups(&self) -> AppResult<Vec<StudyGroup>>;
    async fn find_study_group(&self, id: &str) -> AppResult<Option<StudyGroup>>;
    async fn insert_study_group(&self, group: &StudyGroup) -> AppResult<()>;
    /// Compare-and-set on the members list; `false` when it changed.
    async fn replace_group_members(
        &self,
        group_id: &str,
        expected: &[String],
        members: &[String],
    ) -> AppResult<bool>;
}

impl TripUpdate {
    /// The trip as it reads once the update is committed.
    pub fn updated_trip(&self) -> Trip {
        Trip {
            seats_available: self.seats_available,
            passenger_ids: self.passenger_ids.clone(),
            ..self.expected.clone()
        }
    }
}
