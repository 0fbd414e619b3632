use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use dearme_types::api::{Claims, MemoryRequest};
use dearme_types::models::Memory;
use dearme_types::validation::Validate;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

const NOT_FOUND: &str = "Memory not found.";

pub async fn list_memories(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Memory>>, ApiError> {
    let db = state.db.clone();
    let memories = blocking(move || Ok(db.list_memories(claims.sub)?)).await?;
    Ok(Json(memories))
}

pub async fn get_memory(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Memory>, ApiError> {
    let db = state.db.clone();
    blocking(move || Ok(db.get_memory(claims.sub, id)?))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn create_memory(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MemoryRequest>,
) -> Result<(StatusCode, Json<Memory>), ApiError> {
    let draft = req.validate()?;
    let db = state.db.clone();
    let memory = blocking(move || Ok(db.create_memory(claims.sub, &draft)?)).await?;
    Ok((StatusCode::CREATED, Json(memory)))
}

pub async fn update_memory(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<MemoryRequest>,
) -> Result<Json<Memory>, ApiError> {
    let draft = req.validate()?;
    let db = state.db.clone();
    blocking(move || Ok(db.update_memory(claims.sub, id, &draft)?))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

pub async fn delete_memory(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    if blocking(move || Ok(db.delete_memory(claims.sub, id)?)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(NOT_FOUND))
    }
}
