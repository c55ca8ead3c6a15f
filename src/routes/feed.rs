//! Notifications, chat messages and the credit log: append-and-list tables
//! that clients poll.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    models::{
        credit_log::{CreditLog, CreditLogDraft},
        message::{Message, MessageDraft},
        notification::{Notification, NotificationDraft},
    },
    services::sync::SyncKind,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(list_notifications).post(add_notification),
        )
        .route("/notifications/:id/read", put(mark_read))
        .route("/messages", post(send_message))
        .route("/messages/:thread_id", get(list_messages))
        .route("/credit-logs", post(add_credit_log))
        .route("/credit-logs/:user_id", get(list_credit_logs))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationQuery {
    user_id: Option<String>,
}

async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let Some(user_id) = query.user_id.filter(|id| !id.is_empty()) else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(state.repo.list_notifications(&user_id).await?))
}

async fn add_notification(
    State(state): State<AppState>,
    Json(draft): Json<NotificationDraft>,
) -> Result<impl IntoResponse, AppError> {
    let notification = draft.into_notification();
    state.repo.insert_notification(&notification).await?;
    state
        .sync
        .publish(SyncKind::Notifications, &notification.user_id);
    Ok(Json(
        json!({ "message": "Notification added", "id": notification.id }),
    ))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let owner = state
        .repo
        .mark_notification_read(&id)
        .await?
        .ok_or_else(|| AppError::not_found("notification", &id))?;
    state.sync.publish(SyncKind::Notifications, owner);
    Ok(Json(json!({ "message": "Marked as read" })))
}

async fn list_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(state.repo.list_messages(&thread_id).await?))
}

async fn send_message(
    State(state): State<AppState>,
    Json(draft): Json<MessageDraft>,
) -> Result<impl IntoResponse, AppError> {
    if draft.text.trim().is_empty() {
        return Err(AppError::BadRequest("message text is empty".into()));
    }
    let message = draft.into_message();
    state.repo.insert_message(&message).await?;
    state.sync.publish(SyncKind::Messages, &message.trip_id);
    Ok(Json(json!({ "message": "Message sent", "id": message.id })))
}

async fn list_credit_logs(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<CreditLog>>, AppError> {
    Ok(Json(state.repo.list_credit_logs(&user_id).await?))
}

async fn add_credit_log(
    State(state): State<AppState>,
    Json(draft): Json<CreditLogDraft>,
) -> Result<impl IntoResponse, AppError> {
    let entry = draft.into_log();
    state.repo.insert_credit_log(&entry).await?;
    state.sync.publish(SyncKind::CreditLogs, &entry.user_id);
    Ok(Json(json!({ "message": "Log added", "id": entry.id })))
}
