use async_trait::async_trait;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};

use super::{
    rows::{collect_rows, encode_list, NotificationRow, StudyGroupRow, TripRow, UserRow},
    unique_violation_as_conflict, Repository, TripRemoval, TripUpdate,
};
use crate::{
    error::AppResult,
    models::{
        credit_log::CreditLog, message::Message, notification::Notification,
        study_group::StudyGroup, trip::Trip, user::User,
    },
};

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn fetch_user<'c, E>(executor: E, id: &str) -> AppResult<Option<User>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, role, skills, accessibility_needs, credits, password_hash \
         FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    row.map(User::try_from).transpose()
}

async fn insert_notification_with<'c, E>(executor: E, notification: &Notification) -> AppResult<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO notifications (id, user_id, text, is_read, kind, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&notification.id)
    .bind(&notification.user_id)
    .bind(&notification.text)
    .bind(notification.read)
    .bind(notification.kind.as_str())
    .bind(notification.timestamp)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_credit_log_with<'c, E>(executor: E, entry: &CreditLog) -> AppResult<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO credit_logs (id, user_id, amount, reason, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.user_id)
    .bind(entry.amount)
    .bind(&entry.reason)
    .bind(entry.timestamp)
    .execute(executor)
    .await?;
    Ok(())
}

async fn apply_credit_with(conn: &mut SqliteConnection, entry: &CreditLog) -> AppResult<bool> {
    let result = sqlx::query("UPDATE users SET credits = credits + ? WHERE id = ?")
        .bind(entry.amount)
        .bind(&entry.user_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }
    insert_credit_log_with(&mut *conn, entry).await?;
    Ok(true)
}

async fn upsert_trip_with<'c, E>(executor: E, trip: &Trip) -> AppResult<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO trips (id, driver_id, driver_name, from_loc, to_loc, departure_time, \
         seats_available, distance_km, co2_saved, tutoring_subject, assistance_offered, \
         special_equipment, passenger_ids) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
         driver_id = excluded.driver_id, driver_name = excluded.driver_name, \
         from_loc = excluded.from_loc, to_loc = excluded.to_loc, \
         departure_time = excluded.departure_time, seats_available = excluded.seats_available, \
         distance_km = excluded.distance_km, co2_saved = excluded.co2_saved, \
         tutoring_subject = excluded.tutoring_subject, \
         assistance_offered = excluded.assistance_offered, \
         special_equipment = excluded.special_equipment, passenger_ids = excluded.passenger_ids",
    )
    .bind(&trip.id)
    .bind(&trip.driver_id)
    .bind(&trip.driver_name)
    .bind(&trip.from)
    .bind(&trip.to)
    .bind(&trip.departure_time)
    .bind(trip.seats_available)
    .bind(trip.distance_km)
    .bind(trip.co2_saved)
    .bind(&trip.tutoring_subject)
    .bind(trip.assistance_offered)
    .bind(encode_list(&trip.special_equipment)?)
    .bind(encode_list(&trip.passenger_ids)?)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, role, skills, accessibility_needs, credits, password_hash \
             FROM users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows)
    }

    async fn find_user(&self, id: &str) -> AppResult<Option<User>> {
        fetch_user(&self.pool, id).await
    }

    async fn upsert_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, role, skills, accessibility_needs, credits, password_hash) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             name = excluded.name, role = excluded.role, skills = excluded.skills, \
             accessibility_needs = excluded.accessibility_needs, credits = excluded.credits, \
             password_hash = COALESCE(excluded.password_hash, users.password_hash)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(encode_list(&user.skills)?)
        .bind(encode_list(&user.accessibility_needs)?)
        .bind(user.credits)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, role, skills, accessibility_needs, credits, password_hash) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(encode_list(&user.skills)?)
        .bind(encode_list(&user.accessibility_needs)?)
        .bind(user.credits)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            unique_violation_as_conflict(err, format!("{} is already registered", user.id))
        })?;
        Ok(())
    }

    async fn adjust_credits(&self, user_id: &str, amount: i64) -> AppResult<Option<User>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE users SET credits = credits + ? WHERE id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let user = fetch_user(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn record_credit(&self, entry: &CreditLog) -> AppResult<Option<User>> {
        let mut tx = self.pool.begin().await?;
        if !apply_credit_with(&mut *tx, entry).await? {
            tx.rollback().await?;
            return Ok(None);
        }
        let user = fetch_user(&mut *tx, &entry.user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn top_users(&self, limit: i64) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, role, skills, accessibility_needs, credits, password_hash \
             FROM users ORDER BY credits DESC, name ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows)
    }

    async fn list_trips(&self) -> AppResult<Vec<Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(
            "SELECT id, driver_id, driver_name, from_loc, to_loc, departure_time, seats_available, \
             distance_km, co2_saved, tutoring_subject, assistance_offered, special_equipment, \
             passenger_ids FROM trips ORDER BY departure_time",
        )
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows)
    }

    async fn find_trip(&self, id: &str) -> AppResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(
            "SELECT id, driver_id, driver_name, from_loc, to_loc, departure_time, seats_available, \
             distance_km, co2_saved, tutoring_subject, assistance_offered, special_equipment, \
             passenger_ids FROM trips WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Trip::try_from).transpose()
    }

    async fn upsert_trip(&self, trip: &Trip) -> AppResult<()> {
        upsert_trip_with(&self.pool, trip).await
    }

    async fn insert_offered_trip(&self, trip: &Trip, bonus: &CreditLog) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        upsert_trip_with(&mut *tx, trip).await?;
        if !apply_credit_with(&mut *tx, bonus).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn apply_trip_update(&self, update: &TripUpdate) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE trips SET seats_available = ?, passenger_ids = ? \
             WHERE id = ? AND seats_available = ? AND passenger_ids = ?",
        )
        .bind(update.seats_available)
        .bind(encode_list(&update.passenger_ids)?)
        .bind(&update.expected.id)
        .bind(update.expected.seats_available)
        .bind(encode_list(&update.expected.passenger_ids)?)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(entry) = &update.credit {
            apply_credit_with(&mut *tx, entry).await?;
        }
        for notification in &update.notifications {
            insert_notification_with(&mut *tx, notification).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn apply_trip_removal(&self, removal: &TripRemoval) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM trips WHERE id = ? AND passenger_ids = ?")
            .bind(&removal.expected.id)
            .bind(encode_list(&removal.expected.passenger_ids)?)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(entry) = &removal.credit {
            apply_credit_with(&mut *tx, entry).await?;
        }
        for notification in &removal.notifications {
            insert_notification_with(&mut *tx, notification).await?;
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn list_notifications(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT id, user_id, text, is_read, kind, created_at FROM notifications \
             WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn insert_notification(&self, notification: &Notification) -> AppResult<()> {
        insert_notification_with(&self.pool, notification).await
    }

    async fn mark_notification_read(&self, id: &str) -> AppResult<Option<String>> {
        let owner = sqlx::query_scalar::<_, String>(
            "UPDATE notifications SET is_read = 1 WHERE id = ? RETURNING user_id",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner)
    }

    async fn list_messages(&self, thread_id: &str) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT id, trip_id, sender_id, sender_name, text, created_at FROM messages \
             WHERE trip_id = ? ORDER BY created_at ASC",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn insert_message(&self, message: &Message) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, trip_id, sender_id, sender_name, text, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.trip_id)
        .bind(&message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.text)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_credit_logs(&self, user_id: &str) -> AppResult<Vec<CreditLog>> {
        let logs = sqlx::query_as::<_, CreditLog>(
            "SELECT id, user_id, amount, reason, created_at FROM credit_logs \
             WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    async fn insert_credit_log(&self, entry: &CreditLog) -> AppResult<()> {
        insert_credit_log_with(&self.pool, entry).await
    }

    async fn list_study_groups(&self) -> AppResult<Vec<StudyGroup>> {
        let rows = sqlx::query_as::<_, StudyGroupRow>(
            "SELECT id, train_number, train_line, departure_time, subject, from_loc, creator_id, \
             members, max_members FROM study_groups ORDER BY departure_time",
        )
        .fetch_all(&self.pool)
        .await?;
        collect_rows(rows)
    }

    async fn find_study_group(&self, id: &str) -> AppResult<Option<StudyGroup>> {
        let row = sqlx::query_as::<_, StudyGroupRow>(
            "SELECT id, train_number, train_line, departure_time, subject, from_loc, creator_id, \
             members, max_members FROM study_groups WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(StudyGroup::try_from).transpose()
    }

    async fn insert_study_group(&self, group: &StudyGroup) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO study_groups (id, train_number, train_line, departure_time, subject, \
             from_loc, creator_id, members, max_members) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&group.id)
        .bind(&group.train_number)
        .bind(&group.train_line)
        .bind(&group.departure_time)
        .bind(&group.subject)
        .bind(&group.from)
        .bind(&group.creator_id)
        .bind(encode_list(&group.members)?)
        .bind(group.max_members)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_group_members(
        &self,
        group_id: &str,
        expected: &[String],
        members: &[String],
    ) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE study_groups SET members = ? WHERE id = ? AND members = ?")
                .bind(encode_list(members)?)
                .bind(group_id)
                .bind(encode_list(expected)?)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
