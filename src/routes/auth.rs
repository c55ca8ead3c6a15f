use axum::{extract::State, routing::{get, post}, Json, Router};
use axum_extra::extract::PrivateCookieJar;
use tracing::info;

use crate::{
    auth::{self, CurrentUser, LoginRequest, SignupRequest},
    error::AppError,
    models::user::User,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

async fn signup(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(request): Json<SignupRequest>,
) -> Result<(PrivateCookieJar, Json<User>), AppError> {
    let user = auth::register_user(&state, request).await?;
    Ok((auth::apply_session_cookie(jar, &user.id), Json(user)))
}

async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(PrivateCookieJar, Json<User>), AppError> {
    let user = auth::authenticate_user(&state, &request.email, &request.password).await?;
    info!(user = %user.id, "logged in");
    Ok((auth::apply_session_cookie(jar, &user.id), Json(user)))
}

async fn logout(jar: PrivateCookieJar) -> PrivateCookieJar {
    auth::clear_session_cookie(jar)
}

async fn me(current: CurrentUser) -> Result<Json<User>, AppError> {
    Ok(Json(current.require_user()?.clone()))
}
