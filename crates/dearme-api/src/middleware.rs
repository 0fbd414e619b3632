use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;
use crate::tokens::decode_session_token;

const AUTH_REQUIRED: &str = "Authentication required.";

/// Validate the bearer token and stash its claims in request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized(AUTH_REQUIRED))?;

    let claims =
        decode_session_token(&state.jwt_secret, token).map_err(|_| ApiError::Unauthorized(AUTH_REQUIRED))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
