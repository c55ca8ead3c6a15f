use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::study_group::{StudyGroup, StudyGroupDraft},
    services::study,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/study-groups", get(list_groups).post(create_group))
        .route("/study-groups/:id/join", post(join_group))
}

async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<StudyGroup>>, AppError> {
    Ok(Json(state.repo.list_study_groups().await?))
}

async fn create_group(
    State(state): State<AppState>,
    Json(draft): Json<StudyGroupDraft>,
) -> Result<impl IntoResponse, AppError> {
    let group = study::create(&state, draft).await?;
    Ok(Json(json!({ "message": "Study group created", "group": group })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    #[serde(default)]
    user_id: Option<String>,
}

async fn join_group(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(group_id): Path<String>,
    Json(body): Json<JoinRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = current.resolve_id(body.user_id)?;
    let outcome = study::join(&state, &group_id, &user_id).await?;
    Ok(Json(json!({
        "message": outcome.message(),
        "members": outcome.members(),
    })))
}
