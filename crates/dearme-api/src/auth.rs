use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::{info, warn};

use dearme_db::DbError;
use dearme_db::models::NewUser;
use dearme_mail::templates::{password_reset_email, verification_email};
use dearme_types::api::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, ResetPasswordRequest,
    SignupRequest, SignupResponse,
};
use dearme_types::validation::{FieldErrors, Validate};

use crate::error::ApiError;
use crate::state::{AppState, blocking};
use crate::tokens::{
    check_reset_token, check_verification_token, create_reset_token, create_session_token,
    create_verification_token, reset_token_user,
};

const DUPLICATE_EMAIL: &str =
    "Email already exists. Did you forget your password? You can reset it.";
const INVALID_LINK: &str = "The link is invalid or has expired.";

fn duplicate_email() -> ApiError {
    ApiError::Conflict {
        message: DUPLICATE_EMAIL.to_string(),
        fields: FieldErrors::single("email", "A user with that email already exists."),
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            ApiError::Internal
        })
}

fn password_matches(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Create an inactive account and email a verification link.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let db = state.db.clone();
    let email = req.email.clone();
    if blocking(move || Ok(db.email_exists(&email)?)).await? {
        return Err(duplicate_email());
    }

    let new = req.validate()?;

    let db = state.db.clone();
    let user = blocking(move || {
        let password_hash = hash_password(&new.password)?;
        db.create_user(&NewUser {
            username: &new.username,
            email: &new.email,
            password_hash: &password_hash,
            first_name: &new.first_name,
            last_name: &new.last_name,
        })
        .map_err(|e| match e {
            DbError::Conflict { field: "email" } => duplicate_email(),
            other => other.into(),
        })
    })
    .await?;
    info!(user_id = %user.id, username = %user.username, "account created");

    let token = create_verification_token(&state.jwt_secret, user.id, Utc::now()).map_err(|e| {
        tracing::error!("verification token: {}", e);
        ApiError::Internal
    })?;
    let link = state.link(&format!("/auth/verify/{token}"));

    let message = match state
        .gateway
        .send(&verification_email(&user.username, &user.email, &link))
        .await
    {
        Ok(()) => "We've sent you an email with a verification link. Please check your inbox \
                   and junk/spam folder. Add our email to your safe senders list so you don't \
                   miss future emails."
            .to_string(),
        Err(e) => {
            warn!(user_id = %user.id, "verification email failed: {}", e);
            "Your account was created, but we could not send the verification email. \
             Try again later."
                .to_string()
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: user.id,
            message,
        }),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = check_verification_token(&state.jwt_secret, &token)
        .map_err(|_| ApiError::BadRequest(INVALID_LINK.to_string()))?;

    let db = state.db.clone();
    if !blocking(move || Ok(db.mark_email_verified(user_id)?)).await? {
        return Err(ApiError::BadRequest(INVALID_LINK.to_string()));
    }
    info!(%user_id, "email verified");

    Ok(Json(MessageResponse::new(
        "Your email has been verified. You can now log in.",
    )))
}

/// Log in with username or email.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    const BAD_CREDENTIALS: &str = "Invalid username/email or password.";

    let db = state.db.clone();
    let user = blocking(move || {
        let Some(row) = db.get_user_by_login(&req.login)? else {
            return Ok(None);
        };
        Ok(password_matches(&req.password, &row.password).then_some(row.user))
    })
    .await?
    .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))?;

    if !user.is_email_verified {
        return Err(ApiError::Forbidden(
            "Please verify your email before logging in. Check your inbox and junk/spam folder."
                .to_string(),
        ));
    }

    let token = create_session_token(&state.jwt_secret, user.id, &user.username, Utc::now())
        .map_err(|e| {
            tracing::error!("session token: {}", e);
            ApiError::Internal
        })?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.db.clone();
    let row = blocking(move || Ok(db.get_user_by_email(&req.email)?))
        .await?
        .ok_or(ApiError::NotFound(
            "No user exists with this email or it is typed incorrectly.",
        ))?;

    let token = create_reset_token(&state.jwt_secret, row.user.id, &row.password, Utc::now());
    let link = state.link(&format!("/reset-password?token={token}"));

    state
        .gateway
        .send(&password_reset_email(&row.user.username, &row.user.email, &link))
        .await
        .map_err(|e| {
            warn!(user_id = %row.user.id, "password reset email failed: {}", e);
            ApiError::Unavailable("Could not send email. Try again later.".to_string())
        })?;

    Ok(Json(MessageResponse::new(
        "Check your email for the password reset link.",
    )))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let reset = req.validate()?;
    let invalid = || ApiError::BadRequest(INVALID_LINK.to_string());
    let user_id = reset_token_user(&reset.token).map_err(|_| invalid())?;

    let db = state.db.clone();
    let secret = state.jwt_secret.clone();
    blocking(move || {
        let row = db.get_user_by_id(user_id)?.ok_or_else(invalid)?;
        check_reset_token(&secret, &reset.token, &row.password, Utc::now())
            .map_err(|_| invalid())?;

        let password_hash = hash_password(&reset.password)?;
        if !db.set_password(user_id, &password_hash)? {
            return Err(invalid());
        }
        Ok(())
    })
    .await?;
    info!(%user_id, "password reset");

    Ok(Json(MessageResponse::new(
        "Your password has been reset. You can now log in.",
    )))
}
