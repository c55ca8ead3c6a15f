use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::{
    cookie::{Cookie, Key, SameSite},
    PrivateCookieJar,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::user::{normalize_email, User, UserRole},
    services::sync::SyncKind,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "ecoshift_session";
pub const WELCOME_BONUS: i64 = 500;

/// The user behind the session cookie, if any.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .map_err(|never| -> AppError { match never {} })?;
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        let user = state.repo.find_user(cookie.value()).await?;
        Ok(Self(user))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&User, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    /// An explicit id from the request wins over the session.
    pub fn resolve_id(&self, explicit: Option<String>) -> Result<String, AppError> {
        match explicit.filter(|id| !id.trim().is_empty()) {
            Some(id) => Ok(id),
            None => Ok(self.require_user()?.id.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AppError::Other(anyhow::anyhow!("stored password hash unreadable: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub async fn register_user(state: &AppState, request: SignupRequest) -> AppResult<User> {
    let id = normalize_email(&request.email);
    if id.is_empty() || !id.contains('@') {
        return Err(AppError::BadRequest("a valid email is required".into()));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    if request.password.is_empty() {
        return Err(AppError::BadRequest("password is required".into()));
    }
    if state.repo.find_user(&id).await?.is_some() {
        return Err(AppError::Conflict(format!("{id} is already registered")));
    }

    let user = User {
        id,
        name: request.name.trim().to_string(),
        role: request.role,
        skills: Vec::new(),
        accessibility_needs: Vec::new(),
        credits: WELCOME_BONUS,
        password_hash: Some(hash_password(&request.password)?),
    };
    state.repo.insert_user(&user).await?;
    info!(user = %user.id, "user registered");
    state.sync.publish(SyncKind::Users, &user.id);
    Ok(user)
}

/// Accounts created without a password accept any password.
pub async fn authenticate_user(state: &AppState, email: &str, password: &str) -> AppResult<User> {
    let id = normalize_email(email);
    let user = state
        .repo
        .find_user(&id)
        .await?
        .ok_or_else(|| AppError::not_found("user", &id))?;
    if let Some(hash) = user.password_hash.as_deref() {
        if !verify_password(password, hash)? {
            return Err(AppError::Unauthorized);
        }
    }
    Ok(user)
}

pub fn apply_session_cookie(jar: PrivateCookieJar, user_id: &str) -> PrivateCookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, user_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/").build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_right_password() {
        let hash = hash_password("treno-2026").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("treno-2026", &hash).unwrap());
        assert!(!verify_password("treno-2025", &hash).unwrap());
    }

    #[test]
    fn explicit_ids_win_over_the_session() {
        let anonymous = CurrentUser::default();
        assert_eq!(
            anonymous.resolve_id(Some("ada@uni.it".into())).unwrap(),
            "ada@uni.it"
        );
        assert!(matches!(
            anonymous.resolve_id(Some("  ".into())),
            Err(AppError::Unauthorized)
        ));
    }
}
