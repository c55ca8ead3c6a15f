//! Flat row shapes shared by both backends. Array columns are JSON text
//! and are decoded into the domain models here.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::warn;

use crate::{
    error::{AppError, AppResult},
    models::{notification::Notification, study_group::StudyGroup, trip::Trip, user::User},
};

pub fn encode_list(items: &[String]) -> AppResult<String> {
    Ok(serde_json::to_string(items)?)
}

/// Empty or blank columns decode to an empty list.
pub fn decode_list(raw: &str) -> AppResult<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str::<Option<Vec<String>>>(raw)?.unwrap_or_default())
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub role: String,
    pub skills: String,
    pub accessibility_needs: String,
    pub credits: i64,
    pub password_hash: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().unwrap_or_else(|_| {
            warn!(user = %row.id, role = %row.role, "unknown role in users row, using default");
            Default::default()
        });
        Ok(User {
            role,
            skills: decode_list(&row.skills)?,
            accessibility_needs: decode_list(&row.accessibility_needs)?,
            id: row.id,
            name: row.name,
            credits: row.credits,
            password_hash: row.password_hash,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct TripRow {
    pub id: String,
    pub driver_id: String,
    pub driver_name: String,
    pub from_loc: String,
    pub to_loc: String,
    pub departure_time: String,
    pub seats_available: i64,
    pub distance_km: f64,
    pub co2_saved: f64,
    pub tutoring_subject: Option<String>,
    pub assistance_offered: bool,
    pub special_equipment: String,
    pub passenger_ids: String,
}

impl TryFrom<TripRow> for Trip {
    type Error = AppError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            special_equipment: decode_list(&row.special_equipment)?,
            passenger_ids: decode_list(&row.passenger_ids)?,
            id: row.id,
            driver_id: row.driver_id,
            driver_name: row.driver_name,
            from: row.from_loc,
            to: row.to_loc,
            departure_time: row.departure_time,
            seats_available: row.seats_available,
            distance_km: row.distance_km,
            co2_saved: row.co2_saved,
            tutoring_subject: row.tutoring_subject,
            assistance_offered: row.assistance_offered,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub is_read: bool,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        let kind = row.kind.parse().unwrap_or_else(|_| {
            warn!(
                notification = %row.id,
                kind = %row.kind,
                "unknown kind in notifications row, using default"
            );
            Default::default()
        });
        Notification {
            id: row.id,
            user_id: row.user_id,
            text: row.text,
            read: row.is_read,
            kind,
            timestamp: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct StudyGroupRow {
    pub id: String,
    pub train_number: String,
    pub train_line: String,
    pub departure_time: String,
    pub subject: String,
    pub from_loc: String,
    pub creator_id: String,
    pub members: String,
    pub max_members: i64,
}

impl TryFrom<StudyGroupRow> for StudyGroup {
    type Error = AppError;

    fn try_from(row: StudyGroupRow) -> Result<Self, Self::Error> {
        Ok(StudyGroup {
            members: decode_list(&row.members)?,
            id: row.id,
            train_number: row.train_number,
            train_line: row.train_line,
            departure_time: row.departure_time,
            subject: row.subject,
            from: row.from_loc,
            creator_id: row.creator_id,
            max_members: row.max_members,
        })
    }
}

pub fn collect_rows<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}
