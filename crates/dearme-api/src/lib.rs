pub mod auth;
pub mod diaries;
pub mod error;
pub mod letters;
pub mod memories;
pub mod middleware;
pub mod profile;
pub mod state;
pub mod tokens;

use axum::{
    Json, Router, middleware as axum_middleware,
    routing::{get, post},
};
use serde_json::json;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// All routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/verify/{token}", get(auth::verify_email))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route("/letters", get(letters::list_letters).post(letters::create_letter))
        .route(
            "/letters/{id}",
            get(letters::get_letter)
                .put(letters::edit_letter)
                .delete(letters::delete_letter),
        )
        .route("/letters/{id}/schedule", post(letters::schedule_letter))
        .route("/letters/{id}/lock", post(letters::lock_letter))
        .route("/letters/{id}/send", post(letters::send_letter))
        .route("/memories", get(memories::list_memories).post(memories::create_memory))
        .route(
            "/memories/{id}",
            get(memories::get_memory)
                .put(memories::update_memory)
                .delete(memories::delete_memory),
        )
        .route("/diaries", get(diaries::list_diaries).post(diaries::create_diary))
        .route(
            "/diaries/{id}",
            get(diaries::get_diary)
                .put(diaries::update_diary)
                .delete(diaries::delete_diary),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
