use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::trip::{Trip, TripDraft, TripFilter},
    services::{
        rides::{self, RideReceipt},
        sync::SyncKind,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips).post(save_trip))
        .route("/trips/offer", post(offer_trip))
        .route("/trips/:id", delete(cancel_trip))
        .route("/trips/:id/book", post(book_trip))
        .route("/trips/:id/cancel", post(cancel_participation))
}

async fn list_trips(
    State(state): State<AppState>,
    Query(filter): Query<TripFilter>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let trips = state.repo.list_trips().await?;
    Ok(Json(filter.apply(trips)))
}

/// Plain insert-or-replace, no credits involved.
async fn save_trip(
    State(state): State<AppState>,
    Json(draft): Json<TripDraft>,
) -> Result<impl IntoResponse, AppError> {
    let trip = draft.into_trip();
    rides::validate_trip(&trip)?;
    state.repo.upsert_trip(&trip).await?;
    state.sync.publish(SyncKind::Trips, &trip.id);
    Ok(Json(json!({ "message": "Trip saved", "id": trip.id })))
}

async fn offer_trip(
    State(state): State<AppState>,
    Json(draft): Json<TripDraft>,
) -> Result<Json<RideReceipt>, AppError> {
    Ok(Json(rides::offer(&state, draft).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeatRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default = "one_seat")]
    seats: i64,
}

fn one_seat() -> i64 {
    1
}

async fn book_trip(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Json(body): Json<SeatRequest>,
) -> Result<Json<RideReceipt>, AppError> {
    let user_id = current.resolve_id(body.user_id)?;
    Ok(Json(rides::book(&state, &trip_id, &user_id, body.seats).await?))
}

async fn cancel_participation(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Json(body): Json<SeatRequest>,
) -> Result<Json<RideReceipt>, AppError> {
    let user_id = current.resolve_id(body.user_id)?;
    Ok(Json(
        rides::cancel_participation(&state, &trip_id, &user_id).await?,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelTripQuery {
    user_id: Option<String>,
}

async fn cancel_trip(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
    Query(query): Query<CancelTripQuery>,
) -> Result<Json<RideReceipt>, AppError> {
    let requested_by = query
        .user_id
        .or_else(|| current.0.as_ref().map(|user| user.id.clone()));
    Ok(Json(
        rides::cancel_trip(&state, &trip_id, requested_by.as_deref()).await?,
    ))
}
