use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::{new_id, normalize_optional};

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub driver_id: String,
    pub driver_name: String,
    pub from: String,
    pub to: String,
    pub departure_time: String,
    pub seats_available: i64,
    pub distance_km: f64,
    #[serde(default)]
    pub co2_saved: f64,
    pub tutoring_subject: Option<String>,
    #[serde(default)]
    pub assistance_offered: bool,
    #[serde(default)]
    pub special_equipment: Vec<String>,
    #[serde(default)]
    pub passenger_ids: Vec<String>,
}

impl Trip {
    pub fn has_passenger(&self, user_id: &str) -> bool {
        self.passenger_ids.iter().any(|id| id == user_id)
    }

    /// Driver or passenger.
    pub fn involves(&self, user_id: &str) -> bool {
        self.driver_id == user_id || self.has_passenger(user_id)
    }
}

/// Body of `POST /api/trips` and `POST /api/trips/offer`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub driver_id: String,
    pub driver_name: String,
    pub from: String,
    pub to: String,
    pub departure_time: String,
    pub seats_available: i64,
    pub distance_km: f64,
    #[serde(default)]
    pub co2_saved: Option<f64>,
    #[serde(default)]
    pub tutoring_subject: Option<String>,
    #[serde(default)]
    pub assistance_offered: bool,
    #[serde(default)]
    pub special_equipment: Vec<String>,
    #[serde(default)]
    pub passenger_ids: Vec<String>,
}

impl TripDraft {
    pub fn into_trip(self) -> Trip {
        let co2_saved = self
            .co2_saved
            .unwrap_or_else(|| estimated_co2_saved(self.distance_km));
        Trip {
            id: normalize_optional(self.id).unwrap_or_else(new_id),
            driver_id: self.driver_id,
            driver_name: self.driver_name,
            from: self.from,
            to: self.to,
            departure_time: self.departure_time,
            seats_available: self.seats_available,
            distance_km: self.distance_km,
            co2_saved,
            tutoring_subject: normalize_optional(self.tutoring_subject),
            assistance_offered: self.assistance_offered,
            special_equipment: self.special_equipment,
            passenger_ids: self.passenger_ids,
        }
    }
}

/// Rough per-trip estimate shown on freshly offered rides: 0.3 kg per km,
/// rounded to one decimal.
pub fn estimated_co2_saved(distance_km: f64) -> f64 {
    (distance_km * 0.3 * 10.0).round() / 10.0
}

/// Query string of `GET /api/trips`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripFilter {
    pub subject: Option<String>,
    #[serde(default)]
    pub accessible_only: bool,
    pub q: Option<String>,
    pub mine: Option<String>,
}

impl TripFilter {
    pub fn matches(&self, trip: &Trip) -> bool {
        if let Some(user_id) = self.mine.as_deref() {
            if !trip.involves(user_id) {
                return false;
            }
        }
        if let Some(subject) = self.subject.as_deref().filter(|s| *s != "all") {
            if trip.tutoring_subject.as_deref() != Some(subject) {
                return false;
            }
        }
        if self.accessible_only && !trip.assistance_offered {
            return false;
        }

        let query = self.q.as_deref().unwrap_or("").trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let haystacks = [
            trip.driver_name.to_lowercase(),
            trip.from.to_lowercase(),
            trip.to.to_lowercase(),
            trip.tutoring_subject
                .as_deref()
                .unwrap_or("")
                .to_lowercase(),
        ];
        query
            .split_whitespace()
            .filter(|keyword| keyword.chars().count() > 1)
            .any(|keyword| haystacks.iter().any(|field| field.contains(keyword)))
    }

    pub fn apply(&self, trips: Vec<Trip>) -> Vec<Trip> {
        trips.into_iter().filter(|trip| self.matches(trip)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip() -> Trip {
        Trip {
            id: "t1".into(),
            driver_id: "marco@uni.it".into(),
            driver_name: "Marco Rossi".into(),
            from: "Bologna Centrale".into(),
            to: "Campus Cesena".into(),
            departure_time: "2026-10-20T08:00".into(),
            seats_available: 3,
            distance_km: 85.0,
            co2_saved: 25.5,
            tutoring_subject: Some("Fisica".into()),
            assistance_offered: false,
            special_equipment: Vec::new(),
            passenger_ids: vec!["giulia@uni.it".into()],
        }
    }

    #[test]
    fn empty_filter_keeps_everything() {
        assert!(TripFilter::default().matches(&trip()));
    }

    #[test]
    fn keywords_match_any_field_case_insensitively() {
        let filter = TripFilter {
            q: Some("cesena xyz".into()),
            ..TripFilter::default()
        };
        assert!(filter.matches(&trip()));

        let filter = TripFilter {
            q: Some("rossi".into()),
            ..TripFilter::default()
        };
        assert!(filter.matches(&trip()));

        let filter = TripFilter {
            q: Some("milano".into()),
            ..TripFilter::default()
        };
        assert!(!filter.matches(&trip()));
    }

    #[test]
    fn single_letter_keywords_are_ignored() {
        let filter = TripFilter {
            q: Some("a".into()),
            ..TripFilter::default()
        };
        assert!(!filter.matches(&trip()));
    }

    #[test]
    fn subject_accessibility_and_mine() {
        let mut filter = TripFilter {
            subject: Some("Chimica".into()),
            ..TripFilter::default()
        };
        assert!(!filter.matches(&trip()));
        filter.subject = Some("all".into());
        assert!(filter.matches(&trip()));

        filter.accessible_only = true;
        assert!(!filter.matches(&trip()));
        filter.accessible_only = false;

        filter.mine = Some("giulia@uni.it".into());
        assert!(filter.matches(&trip()));
        filter.mine = Some("marco@uni.it".into());
        assert!(filter.matches(&trip()));
        filter.mine = Some("luca@uni.it".into());
        assert!(!filter.matches(&trip()));
    }

    #[test]
    fn draft_fills_id_and_co2_estimate() {
        let draft: TripDraft = serde_json::from_value(serde_json::json!({
            "driverId": "marco@uni.it",
            "driverName": "Marco",
            "from": "Bologna",
            "to": "Cesena",
            "departureTime": "2026-10-20T08:00",
            "seatsAvailable": 3,
            "distanceKm": 10.0,
            "tutoringSubject": "  "
        }))
        .unwrap();
        let trip = draft.into_trip();
        assert!(!trip.id.is_empty());
        assert_eq!(trip.co2_saved, 3.0);
        assert_eq!(trip.tutoring_subject, None);
        assert!(trip.passenger_ids.is_empty());
    }
}
