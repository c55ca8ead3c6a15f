use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};

use crate::{
    error::AppError,
    services::{
        co2::{self, Co2Request, Co2Savings},
        matching::MatchRequest,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ai/match-reason", post(match_reason))
        .route("/calculate-co2", post(calculate_co2))
}

async fn match_reason(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> Json<Value> {
    let reason = state.matcher.reason(&request).await;
    Json(json!({ "reason": reason }))
}

async fn calculate_co2(Json(request): Json<Co2Request>) -> Result<Json<Co2Savings>, AppError> {
    Ok(Json(co2::calculate(&request)?))
}
