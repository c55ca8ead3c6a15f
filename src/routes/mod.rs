pub mod ai;
pub mod auth;
pub mod events;
pub mod feed;
pub mod study;
pub mod trips;
pub mod users;

use axum::Router;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(trips::router())
        .merge(feed::router())
        .merge(study::router())
        .merge(ai::router())
        .merge(events::router())
        .nest("/auth", auth::router())
}

pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    Router::new()
        .nest("/api", api_router())
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
