//! Daily diary entries. The free-text fields are sealed together as one
//! AES-256-GCM blob; dates, links and photos stay in plain columns.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dearme_crypto::encrypt::{decrypt_field, encrypt_field};
use dearme_db::DbError;
use dearme_db::models::{DiaryRow, DiaryWrite};
use dearme_types::api::{Claims, DiaryDraft, DiaryRequest};
use dearme_types::models::DailyDiary;
use dearme_types::validation::{FieldErrors, Validate};

use crate::error::ApiError;
use crate::state::{AppState, blocking};

const NOT_FOUND: &str = "Diary entry not found.";

#[derive(Serialize, Deserialize)]
struct DiaryText {
    content: String,
    gratitude: String,
    mood: String,
}

fn seal(key: &[u8; 32], draft: DiaryDraft) -> Result<DiaryWrite, ApiError> {
    let text = DiaryText {
        content: draft.content,
        gratitude: draft.gratitude,
        mood: draft.mood,
    };
    let plaintext = serde_json::to_vec(&text).map_err(anyhow::Error::from)?;
    let (ciphertext, nonce) = encrypt_field(key, &plaintext)?;

    Ok(DiaryWrite {
        entry_date: draft.entry_date,
        ciphertext,
        nonce,
        memory_ids: draft.memory_ids,
        photos: draft.photos,
        locations: draft.locations,
    })
}

fn open(key: &[u8; 32], row: DiaryRow) -> Result<DailyDiary, ApiError> {
    let plaintext = decrypt_field(key, &row.ciphertext, &row.nonce)?;
    let text: DiaryText = serde_json::from_slice(&plaintext).map_err(anyhow::Error::from)?;

    Ok(DailyDiary {
        id: row.id,
        owner_id: row.owner_id,
        entry_date: row.entry_date,
        content: text.content,
        gratitude: text.gratitude,
        mood: text.mood,
        memory_ids: row.memory_ids,
        photos: row.photos,
        locations: row.locations,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn already_written(e: DbError) -> ApiError {
    match e {
        DbError::Conflict { .. } => ApiError::Conflict {
            message: "You already have a diary entry for this date.".to_string(),
            fields: FieldErrors::single("entry_date", "An entry for this date already exists."),
        },
        other => other.into(),
    }
}

pub async fn list_diaries(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<DailyDiary>>, ApiError> {
    let db = state.db.clone();
    let rows = blocking(move || Ok(db.list_diaries(claims.sub)?)).await?;
    let diaries = rows
        .into_iter()
        .map(|row| open(&state.diary_key, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(diaries))
}

pub async fn get_diary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<DailyDiary>, ApiError> {
    let db = state.db.clone();
    let row = blocking(move || Ok(db.get_diary(claims.sub, id)?))
        .await?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;
    Ok(Json(open(&state.diary_key, row)?))
}

pub async fn create_diary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DiaryRequest>,
) -> Result<(StatusCode, Json<DailyDiary>), ApiError> {
    let draft = req.validate()?;
    let write = seal(&state.diary_key, draft)?;

    let db = state.db.clone();
    let row = blocking(move || {
        check_memories(&db, claims.sub, &write)?;
        db.create_diary(claims.sub, &write).map_err(already_written)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(open(&state.diary_key, row)?)))
}

pub async fn update_diary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<DiaryRequest>,
) -> Result<Json<DailyDiary>, ApiError> {
    let draft = req.validate()?;
    let write = seal(&state.diary_key, draft)?;

    let db = state.db.clone();
    let row = blocking(move || {
        check_memories(&db, claims.sub, &write)?;
        db.update_diary(claims.sub, id, &write).map_err(already_written)
    })
    .await?
    .ok_or(ApiError::NotFound(NOT_FOUND))?;
    Ok(Json(open(&state.diary_key, row)?))
}

pub async fn delete_diary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    if blocking(move || Ok(db.delete_diary(claims.sub, id)?)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(NOT_FOUND))
    }
}

fn check_memories(
    db: &dearme_db::Database,
    owner_id: Uuid,
    write: &DiaryWrite,
) -> Result<(), ApiError> {
    let owned = db.owned_memory_ids(owner_id, &write.memory_ids)?;
    if owned.len() != write.memory_ids.len() {
        return Err(ApiError::Validation(FieldErrors::single(
            "memory_ids",
            "Select only memories that belong to you.",
        )));
    }
    Ok(())
}
