use axum::{Extension, Json, extract::State};

use dearme_types::api::{Claims, UpdateProfileRequest};
use dearme_types::models::User;
use dearme_types::validation::Validate;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let db = state.db.clone();
    let row = blocking(move || Ok(db.get_user_by_id(claims.sub)?))
        .await?
        .ok_or(ApiError::NotFound("User not found."))?;
    Ok(Json(row.user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let update = req.validate()?;
    let db = state.db.clone();
    let user = blocking(move || Ok(db.update_profile(claims.sub, &update)?)).await?;
    Ok(Json(user))
}
