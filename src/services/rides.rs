//! Offer, booking and cancellation workflows.
//!
//! Each workflow reads the trip, plans the change without touching the
//! database, then hands the plan to the repository, which commits it only
//! if the trip still looks the way it did when read. A lost race is
//! replanned against the fresh row a few times before giving up.

use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::{AppError, AppResult},
    models::{
        credit_log::CreditLog,
        notification::{Notification, NotificationKind},
        trip::{Trip, TripDraft},
        user::User,
    },
    repository::{TripRemoval, TripUpdate},
    services::{
        co2::booking_credits,
        sync::{SyncBus, SyncKind},
    },
    state::AppState,
};

pub const OFFER_BONUS: i64 = 50;
pub const PARTICIPATION_CANCEL_PENALTY: i64 = -30;
pub const TRIP_CANCEL_PENALTY: i64 = -100;
pub const MAX_SEATS: i64 = 99;

const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RideReceipt {
    pub trip: Trip,
    pub credits: i64,
    pub user: Option<User>,
}

fn seat_label(seats: i64) -> &'static str {
    if seats == 1 {
        "seat"
    } else {
        "seats"
    }
}

pub fn validate_trip(trip: &Trip) -> AppResult<()> {
    if trip.from.trim().is_empty() || trip.to.trim().is_empty() {
        return Err(AppError::BadRequest("from and to are required".into()));
    }
    if !(0..=MAX_SEATS).contains(&trip.seats_available) {
        return Err(AppError::BadRequest(format!(
            "seatsAvailable must be between 0 and {MAX_SEATS}"
        )));
    }
    if !trip.distance_km.is_finite() || trip.distance_km < 0.0 {
        return Err(AppError::BadRequest(
            "distanceKm must be a non-negative number".into(),
        ));
    }
    Ok(())
}

pub fn plan_booking(trip: &Trip, passenger: &User, seats: i64) -> AppResult<TripUpdate> {
    if seats < 1 {
        return Err(AppError::BadRequest("at least one seat must be booked".into()));
    }
    if trip.driver_id == passenger.id {
        return Err(AppError::BadRequest(
            "drivers cannot book their own trip".into(),
        ));
    }
    if trip.has_passenger(&passenger.id) {
        return Err(AppError::Conflict("already booked on this trip".into()));
    }
    if trip.seats_available < seats {
        return Err(AppError::Conflict(format!(
            "only {} {} left",
            trip.seats_available,
            seat_label(trip.seats_available)
        )));
    }

    let earned = booking_credits(trip.distance_km, seats);
    let label = seat_label(seats);
    let mut passenger_ids = trip.passenger_ids.clone();
    passenger_ids.push(passenger.id.clone());

    Ok(TripUpdate {
        expected: trip.clone(),
        seats_available: trip.seats_available - seats,
        passenger_ids,
        credit: Some(CreditLog::new(
            &passenger.id,
            earned,
            format!("Booked {seats} {label} to {}", trip.to),
        )),
        notifications: vec![Notification::new(
            &trip.driver_id,
            format!(
                "{} booked {seats} {label} on your trip to {}",
                passenger.name, trip.to
            ),
            NotificationKind::Success,
        )],
    })
}

/// Gives back a single seat whatever was originally booked.
pub fn plan_participation_cancel(trip: &Trip, passenger: &User) -> AppResult<TripUpdate> {
    if !trip.has_passenger(&passenger.id) {
        return Err(AppError::BadRequest("not booked on this trip".into()));
    }
    let seats_available = trip
        .seats_available
        .checked_add(1)
        .ok_or_else(|| AppError::BadRequest("seat count out of range".into()))?;

    Ok(TripUpdate {
        expected: trip.clone(),
        seats_available,
        passenger_ids: trip
            .passenger_ids
            .iter()
            .filter(|id| **id != passenger.id)
            .cloned()
            .collect(),
        credit: Some(CreditLog::new(
            &passenger.id,
            PARTICIPATION_CANCEL_PENALTY,
            format!("Cancelled seat to {}", trip.to),
        )),
        notifications: vec![Notification::new(
            &trip.driver_id,
            format!(
                "{} cancelled their seat on your trip to {}",
                passenger.name, trip.to
            ),
            NotificationKind::Warning,
        )],
    })
}

pub fn plan_trip_cancel(trip: &Trip) -> TripRemoval {
    TripRemoval {
        expected: trip.clone(),
        credit: Some(CreditLog::new(
            &trip.driver_id,
            TRIP_CANCEL_PENALTY,
            format!("Cancelled trip to {}", trip.to),
        )),
        notifications: trip
            .passenger_ids
            .iter()
            .map(|passenger_id| {
                Notification::new(
                    passenger_id,
                    format!(
                        "{} cancelled the trip to {}",
                        trip.driver_name, trip.to
                    ),
                    NotificationKind::Warning,
                )
            })
            .collect(),
    }
}

async fn load_trip(state: &AppState, trip_id: &str) -> AppResult<Trip> {
    state
        .repo
        .find_trip(trip_id)
        .await?
        .ok_or_else(|| AppError::not_found("trip", trip_id))
}

async fn load_user(state: &AppState, user_id: &str) -> AppResult<User> {
    state
        .repo
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))
}

fn publish_trip_change(
    sync: &SyncBus,
    trip_id: &str,
    credit: Option<&CreditLog>,
    notified: &[Notification],
) {
    sync.publish(SyncKind::Trips, trip_id);
    if let Some(entry) = credit {
        sync.publish(SyncKind::Users, &entry.user_id);
        sync.publish(SyncKind::CreditLogs, &entry.user_id);
    }
    for notification in notified {
        sync.publish(SyncKind::Notifications, &notification.user_id);
    }
}

pub async fn offer(state: &AppState, draft: TripDraft) -> AppResult<RideReceipt> {
    let mut trip = draft.into_trip();
    trip.passenger_ids.clear();
    validate_trip(&trip)?;
    load_user(state, &trip.driver_id).await?;

    let bonus = CreditLog::new(
        &trip.driver_id,
        OFFER_BONUS,
        format!("Bonus proposta viaggio: {}", trip.to),
    );
    if !state.repo.insert_offered_trip(&trip, &bonus).await? {
        return Err(AppError::not_found("user", &trip.driver_id));
    }
    info!(trip = %trip.id, driver = %trip.driver_id, "trip offered");
    publish_trip_change(&state.sync, &trip.id, Some(&bonus), &[]);

    let user = state.repo.find_user(&trip.driver_id).await?;
    Ok(RideReceipt {
        trip,
        credits: OFFER_BONUS,
        user,
    })
}

pub async fn book(
    state: &AppState,
    trip_id: &str,
    user_id: &str,
    seats: i64,
) -> AppResult<RideReceipt> {
    let passenger = load_user(state, user_id).await?;

    for attempt in 1..=MAX_ATTEMPTS {
        let trip = load_trip(state, trip_id).await?;
        let update = plan_booking(&trip, &passenger, seats)?;
        if state.repo.apply_trip_update(&update).await? {
            info!(trip = %trip_id, user = %user_id, seats, "seats booked");
            publish_trip_change(
                &state.sync,
                trip_id,
                update.credit.as_ref(),
                &update.notifications,
            );
            return Ok(RideReceipt {
                trip: update.updated_trip(),
                credits: update.credit.as_ref().map_or(0, |entry| entry.amount),
                user: state.repo.find_user(user_id).await?,
            });
        }
        debug!(attempt, trip = %trip_id, "trip changed while booking, replanning");
    }

    Err(AppError::Conflict(
        "trip changed concurrently, please retry".into(),
    ))
}

pub async fn cancel_participation(
    state: &AppState,
    trip_id: &str,
    user_id: &str,
) -> AppResult<RideReceipt> {
    let passenger = load_user(state, user_id).await?;

    for attempt in 1..=MAX_ATTEMPTS {
        let trip = load_trip(state, trip_id).await?;
        let update = plan_participation_cancel(&trip, &passenger)?;
        if state.repo.apply_trip_update(&update).await? {
            info!(trip = %trip_id, user = %user_id, "participation cancelled");
            publish_trip_change(
                &state.sync,
                trip_id,
                update.credit.as_ref(),
                &update.notifications,
            );
            return Ok(RideReceipt {
                trip: update.updated_trip(),
                credits: PARTICIPATION_CANCEL_PENALTY,
                user: state.repo.find_user(user_id).await?,
            });
        }
        debug!(attempt, trip = %trip_id, "trip changed while cancelling, replanning");
    }

    Err(AppError::Conflict(
        "trip changed concurrently, please retry".into(),
    ))
}

/// Deletes the trip. When `requested_by` is known it must be the driver.
pub async fn cancel_trip(
    state: &AppState,
    trip_id: &str,
    requested_by: Option<&str>,
) -> AppResult<RideReceipt> {
    for attempt in 1..=MAX_ATTEMPTS {
        let trip = load_trip(state, trip_id).await?;
        if requested_by.is_some_and(|user_id| user_id != trip.driver_id) {
            return Err(AppError::Forbidden);
        }
        let removal = plan_trip_cancel(&trip);
        if state.repo.apply_trip_removal(&removal).await? {
            info!(
                trip = %trip_id,
                passengers = trip.passenger_ids.len(),
                "trip cancelled"
            );
            publish_trip_change(
                &state.sync,
                trip_id,
                removal.credit.as_ref(),
                &removal.notifications,
            );
            let user = state.repo.find_user(&trip.driver_id).await?;
            return Ok(RideReceipt {
                trip,
                credits: TRIP_CANCEL_PENALTY,
                user,
            });
        }
        debug!(attempt, trip = %trip_id, "trip changed while deleting, replanning");
    }

    Err(AppError::Conflict(
        "trip changed concurrently, please retry".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.into(),
            name: name.into(),
            role: UserRole::Passenger,
            skills: Vec::new(),
            accessibility_needs: Vec::new(),
            credits: 500,
            password_hash: None,
        }
    }

    fn trip(seats: i64, passengers: &[&str]) -> Trip {
        Trip {
            id: "t1".into(),
            driver_id: "marco@uni.it".into(),
            driver_name: "Marco".into(),
            from: "Bologna".into(),
            to: "Cesena".into(),
            departure_time: "2026-10-20T08:00".into(),
            seats_available: seats,
            distance_km: 12.5,
            co2_saved: 3.8,
            tutoring_subject: None,
            assistance_offered: false,
            special_equipment: Vec::new(),
            passenger_ids: passengers.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn booking_takes_seats_and_pays_distance_credits() {
        let update = plan_booking(&trip(3, &[]), &user("giulia@uni.it", "Giulia"), 2).unwrap();
        assert_eq!(update.seats_available, 1);
        assert_eq!(update.passenger_ids, vec!["giulia@uni.it".to_string()]);
        let credit = update.credit.as_ref().unwrap();
        assert_eq!(credit.user_id, "giulia@uni.it");
        assert_eq!(credit.amount, 50);
        assert_eq!(update.notifications.len(), 1);
        assert_eq!(update.notifications[0].user_id, "marco@uni.it");
        assert_eq!(update.notifications[0].kind, NotificationKind::Success);
        assert!(update.notifications[0].text.contains("2 seats"));
    }

    #[test]
    fn booking_more_than_available_fails() {
        let err = plan_booking(&trip(1, &[]), &user("giulia@uni.it", "Giulia"), 2).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn booking_twice_is_rejected() {
        let err = plan_booking(
            &trip(3, &["giulia@uni.it"]),
            &user("giulia@uni.it", "Giulia"),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn zero_seats_and_own_trip_are_bad_requests() {
        assert!(matches!(
            plan_booking(&trip(3, &[]), &user("giulia@uni.it", "Giulia"), 0),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            plan_booking(&trip(3, &[]), &user("marco@uni.it", "Marco"), 1),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn cancelling_restores_one_seat_and_costs_thirty() {
        let update = plan_participation_cancel(
            &trip(1, &["giulia@uni.it", "luca@uni.it"]),
            &user("giulia@uni.it", "Giulia"),
        )
        .unwrap();
        assert_eq!(update.seats_available, 2);
        assert_eq!(update.passenger_ids, vec!["luca@uni.it".to_string()]);
        assert_eq!(update.credit.as_ref().unwrap().amount, -30);
        assert_eq!(update.notifications[0].kind, NotificationKind::Warning);
    }

    #[test]
    fn cancelling_without_booking_fails() {
        assert!(matches!(
            plan_participation_cancel(&trip(3, &[]), &user("giulia@uni.it", "Giulia")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn trip_cancel_notifies_every_passenger() {
        let removal = plan_trip_cancel(&trip(1, &["giulia@uni.it", "luca@uni.it"]));
        let credit = removal.credit.as_ref().unwrap();
        assert_eq!(credit.user_id, "marco@uni.it");
        assert_eq!(credit.amount, -100);
        let notified: Vec<_> = removal
            .notifications
            .iter()
            .map(|n| n.user_id.as_str())
            .collect();
        assert_eq!(notified, vec!["giulia@uni.it", "luca@uni.it"]);
    }

    #[test]
    fn validation_rejects_negative_numbers() {
        let mut bad = trip(-1, &[]);
        assert!(validate_trip(&bad).is_err());
        bad.seats_available = 2;
        bad.distance_km = -3.0;
        assert!(validate_trip(&bad).is_err());
        bad.distance_km = 3.0;
        assert!(validate_trip(&bad).is_ok());
        bad.seats_available = MAX_SEATS + 1;
        assert!(matches!(validate_trip(&bad), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn cancelling_on_a_saturated_seat_count_is_refused() {
        let result = plan_participation_cancel(
            &trip(i64::MAX, &["giulia@uni.it"]),
            &user("giulia@uni.it", "Giulia"),
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
