use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use dearme_letters::{DeliveryOutcome, EditOutcome};
use dearme_types::api::{
    Claims, LetterEditResponse, LetterRequest, LetterView, SendLetterResponse,
};
use dearme_types::validation::Validate;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

pub async fn list_letters(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<LetterView>>, ApiError> {
    let letters = state.letters.clone();
    let list = blocking(move || Ok(letters.list(claims.sub)?)).await?;
    let now = Utc::now();
    Ok(Json(list.into_iter().map(|l| LetterView::at(l, now)).collect()))
}

pub async fn get_letter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<LetterView>, ApiError> {
    let letters = state.letters.clone();
    let letter = blocking(move || Ok(letters.get(claims.sub, id)?)).await?;
    Ok(Json(LetterView::at(letter, Utc::now())))
}

pub async fn create_letter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<LetterRequest>,
) -> Result<(StatusCode, Json<LetterView>), ApiError> {
    let draft = req.validate()?;
    let letters = state.letters.clone();
    let now = Utc::now();
    let letter = blocking(move || Ok(letters.create(claims.sub, &draft, now)?)).await?;
    Ok((StatusCode::CREATED, Json(LetterView::at(letter, now))))
}

/// A letter whose edit window has closed comes back read-only with
/// `"outcome": "locked"` rather than as an error.
pub async fn edit_letter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<LetterRequest>,
) -> Result<Json<LetterEditResponse>, ApiError> {
    let draft = req.validate()?;
    let letters = state.letters.clone();
    let now = Utc::now();
    let outcome = blocking(move || Ok(letters.edit(claims.sub, id, &draft, now)?)).await?;

    Ok(Json(match outcome {
        EditOutcome::Updated(letter) => LetterEditResponse::Updated {
            letter: LetterView::at(letter, now),
        },
        EditOutcome::Locked(letter) => LetterEditResponse::Locked {
            letter: LetterView::at(letter, now),
        },
    }))
}

pub async fn delete_letter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let letters = state.letters.clone();
    blocking(move || Ok(letters.delete(claims.sub, id, Utc::now())?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn schedule_letter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<LetterView>, ApiError> {
    let letters = state.letters.clone();
    let now = Utc::now();
    let letter = blocking(move || Ok(letters.schedule(claims.sub, id, now)?)).await?;
    Ok(Json(LetterView::at(letter, now)))
}

pub async fn lock_letter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<LetterView>, ApiError> {
    let letters = state.letters.clone();
    let now = Utc::now();
    let letter = blocking(move || Ok(letters.lock(claims.sub, id, now)?)).await?;
    Ok(Json(LetterView::at(letter, now)))
}

/// Deliver now, regardless of the delivery date.
pub async fn send_letter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SendLetterResponse>, ApiError> {
    let outcome = state.dispatcher.deliver_now(claims.sub, id).await?;

    let (delivered, message) = match outcome {
        DeliveryOutcome::Delivered => (true, "Letter sent successfully."),
        DeliveryOutcome::Failed(_) => (false, "No recipients found or failed to send email."),
        DeliveryOutcome::Skipped => (false, "This letter is already being delivered."),
    };
    Ok(Json(SendLetterResponse {
        delivered,
        message: message.to_string(),
    }))
}
