use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::hash_password,
    error::AppError,
    models::{
        credit_log::CreditLog,
        normalize_optional,
        user::{normalize_email, LeaderboardEntry, User, UserDraft},
    },
    services::sync::SyncKind,
    state::AppState,
};

const DEFAULT_LEADERBOARD_SIZE: i64 = 5;
const MAX_LEADERBOARD_SIZE: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(save_user))
        .route("/users/:id/credits", post(adjust_credits))
        .route("/leaderboard", get(leaderboard))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.repo.list_users().await?))
}

async fn save_user(
    State(state): State<AppState>,
    Json(draft): Json<UserDraft>,
) -> Result<impl IntoResponse, AppError> {
    let id = normalize_email(&draft.id);
    if id.is_empty() {
        return Err(AppError::BadRequest("id is required".into()));
    }
    let password_hash = match draft.password.filter(|password| !password.is_empty()) {
        Some(password) => Some(hash_password(&password)?),
        None => None,
    };

    let user = User {
        id,
        name: draft.name,
        role: draft.role,
        skills: draft.skills,
        accessibility_needs: draft.accessibility_needs,
        credits: draft.credits,
        password_hash,
    };
    state.repo.upsert_user(&user).await?;
    state.sync.publish(SyncKind::Users, &user.id);

    Ok(Json(json!({ "message": "User saved", "id": user.id })))
}

#[derive(Deserialize)]
struct CreditAdjustment {
    amount: i64,
    #[serde(default)]
    reason: Option<String>,
}

async fn adjust_credits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<CreditAdjustment>,
) -> Result<Json<User>, AppError> {
    let updated = match normalize_optional(body.reason) {
        Some(reason) => {
            let entry = CreditLog::new(&user_id, body.amount, reason);
            let user = state.repo.record_credit(&entry).await?;
            if user.is_some() {
                state.sync.publish(SyncKind::CreditLogs, &user_id);
            }
            user
        }
        None => state.repo.adjust_credits(&user_id, body.amount).await?,
    };

    let user = updated.ok_or_else(|| AppError::not_found("user", &user_id))?;
    state.sync.publish(SyncKind::Users, &user.id);
    Ok(Json(user))
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<i64>,
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    let users = state.repo.top_users(limit).await?;
    Ok(Json(LeaderboardEntry::rank_users(users)))
}
