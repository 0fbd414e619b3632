use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use dearme_db::DbError;
use dearme_letters::LetterError;
use dearme_types::validation::FieldErrors;

#[derive(Debug)]
pub enum ApiError {
    /// 400 with field-level errors.
    Validation(FieldErrors),
    BadRequest(String),
    Unauthorized(&'static str),
    Forbidden(String),
    NotFound(&'static str),
    /// An upstream dependency (the email gateway) failed.
    Unavailable(String),
    /// 409, optionally pointing at the offending fields.
    Conflict {
        message: String,
        fields: FieldErrors,
    },
    Internal,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a FieldErrors>,
}

impl ApiError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Unavailable(_) => "unavailable",
            Self::Conflict { .. } => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Validation(_) => "Please correct the errors below.".to_string(),
            Self::BadRequest(m) | Self::Forbidden(m) | Self::Unavailable(m) => m.clone(),
            Self::Conflict { message, .. } => message.clone(),
            Self::Unauthorized(m) | Self::NotFound(m) => m.to_string(),
            Self::Internal => "Something went wrong. Try again later.".to_string(),
        };
        let fields = match &self {
            Self::Validation(f) => Some(f),
            Self::Conflict { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        };

        let body = ErrorBody {
            error: self.code(),
            message: &message,
            fields,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Conflict { field } => Self::Conflict {
                message: "An entry with this value already exists.".to_string(),
                fields: FieldErrors::single(field, "This value is already taken."),
            },
            DbError::NotFound => Self::NotFound("Not found."),
            other => {
                error!("database error: {}", other);
                Self::Internal
            }
        }
    }
}

impl From<LetterError> for ApiError {
    fn from(e: LetterError) -> Self {
        match e {
            LetterError::NotFound => Self::NotFound("Letter not found."),
            LetterError::AlreadyDelivered => Self::conflict("This letter has already been delivered."),
            other @ (LetterError::InvalidTransition { .. } | LetterError::NotEditable) => {
                Self::conflict(other.to_string())
            }
            LetterError::UnknownReceivers(names) => Self::Validation(FieldErrors::single(
                "receivers",
                format!("Unknown users: {}", names.join(", ")),
            )),
            LetterError::ForeignLinks { field } => Self::Validation(FieldErrors::single(
                field,
                "Select only items that belong to you.",
            )),
            LetterError::Db(e) => e.into(),
            LetterError::Task(e) => e.into(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        error!("spawn_blocking join error: {}", e);
        Self::Internal
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("internal error: {:#}", e);
        Self::Internal
    }
}
