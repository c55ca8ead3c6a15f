use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const FORMULA: &str = "Savings = [(Passengers+1) * Dist * Base] - [Dist * Base]";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    #[default]
    Car,
    Van,
}

impl VehicleType {
    /// Average emissions in grams per kilometre.
    pub fn grams_per_km(self) -> f64 {
        match self {
            VehicleType::Car => 120.0,
            VehicleType::Van => 180.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Co2Request {
    pub distance_km: f64,
    pub passengers: u32,
    #[serde(default)]
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Co2Savings {
    pub saved_kg: f64,
    pub credits: i64,
    pub formula: &'static str,
}

/// Emissions avoided when `passengers` share one vehicle instead of each
/// driving alone. One credit per half kilogram saved.
pub fn calculate(request: &Co2Request) -> AppResult<Co2Savings> {
    if !request.distance_km.is_finite() || request.distance_km < 0.0 {
        return Err(AppError::BadRequest(
            "distanceKm must be a non-negative number".into(),
        ));
    }

    let base = request.vehicle_type.grams_per_km();
    let separate = (f64::from(request.passengers) + 1.0) * request.distance_km * base;
    let shared = request.distance_km * base;
    let saved_grams = separate - shared;
    let saved_kg = (saved_grams / 1000.0 * 10.0).round() / 10.0;

    Ok(Co2Savings {
        saved_kg,
        credits: (saved_kg * 2.0).floor() as i64,
        formula: FORMULA,
    })
}

/// Credits earned by a passenger for booking `seats` on a ride of
/// `distance_km`.
pub fn booking_credits(distance_km: f64, seats: i64) -> i64 {
    (distance_km * 2.0 * seats as f64).floor() as i64
}
