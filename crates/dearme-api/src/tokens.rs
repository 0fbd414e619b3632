//! Signed tokens.
//!
//! Sessions and email verification links are JWTs. Verification tokens carry
//! a dedicated audience and no username, so neither decodes as the other.
//! Password reset links are HMAC signatures over the user id, the issue
//! time and the current password hash; changing the password invalidates
//! every outstanding reset link.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use dearme_crypto::sign;
use dearme_types::api::Claims;

pub const SESSION_DAYS: i64 = 30;
pub const LINK_MAX_AGE_HOURS: i64 = 24;

const VERIFY_AUDIENCE: &str = "dearme:verify-email";
const RESET_PURPOSE: &str = "dearme:password-reset";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid or expired token")]
    Invalid,

    #[error("could not sign token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

pub fn create_session_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    now: DateTime<Utc>,
) -> Result<String, TokenError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (now + Duration::days(SESSION_DAYS)).timestamp() as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn decode_session_token(secret: &str, token: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| TokenError::Invalid)
}

#[derive(Debug, Serialize, Deserialize)]
struct VerifyClaims {
    sub: Uuid,
    aud: String,
    exp: usize,
}

pub fn create_verification_token(
    secret: &str,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<String, TokenError> {
    let claims = VerifyClaims {
        sub: user_id,
        aud: VERIFY_AUDIENCE.to_string(),
        exp: (now + Duration::hours(LINK_MAX_AGE_HOURS)).timestamp() as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Returns the user id the link was issued for.
pub fn check_verification_token(secret: &str, token: &str) -> Result<Uuid, TokenError> {
    let mut validation = Validation::default();
    validation.set_audience(&[VERIFY_AUDIENCE]);
    decode::<VerifyClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims.sub)
        .map_err(|_| TokenError::Invalid)
}

/// `<user id>.<unix seconds>.<hex signature>`
pub fn create_reset_token(
    secret: &str,
    user_id: Uuid,
    password_hash: &str,
    now: DateTime<Utc>,
) -> String {
    let issued = now.timestamp().to_string();
    let id = user_id.to_string();
    let signature = sign::sign(
        &reset_key(secret),
        &[id.as_bytes(), issued.as_bytes(), password_hash.as_bytes()],
    );
    format!("{id}.{issued}.{signature}")
}

/// The user a reset token claims to be for. Says nothing about validity;
/// follow up with [`check_reset_token`] once the user is loaded.
pub fn reset_token_user(token: &str) -> Result<Uuid, TokenError> {
    let (id, _, _) = split_reset_token(token)?;
    id.parse().map_err(|_| TokenError::Invalid)
}

pub fn check_reset_token(
    secret: &str,
    token: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<(), TokenError> {
    let (id, issued, signature) = split_reset_token(token)?;
    let issued_at: i64 = issued.parse().map_err(|_| TokenError::Invalid)?;

    let age = now.timestamp() - issued_at;
    if !(0..=LINK_MAX_AGE_HOURS * 3600).contains(&age) {
        return Err(TokenError::Invalid);
    }

    let valid = sign::verify(
        &reset_key(secret),
        &[id.as_bytes(), issued.as_bytes(), password_hash.as_bytes()],
        signature,
    );
    if valid { Ok(()) } else { Err(TokenError::Invalid) }
}

fn split_reset_token(token: &str) -> Result<(&str, &str, &str), TokenError> {
    let mut parts = token.trim().splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(issued), Some(sig)) if !sig.contains('.') => Ok((id, issued, sig)),
        _ => Err(TokenError::Invalid),
    }
}

fn reset_key(secret: &str) -> [u8; 32] {
    sign::derive_key(secret.as_bytes(), RESET_PURPOSE)
}
