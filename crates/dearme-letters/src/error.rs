use thiserror::Error;
use tokio::task::JoinError;

use dearme_db::DbError;
use dearme_mail::GatewayError;
use dearme_types::models::LetterStatus;

#[derive(Debug, Error)]
pub enum LetterError {
    #[error("letter not found")]
    NotFound,

    #[error("cannot move a {from} letter to {to}")]
    InvalidTransition {
        from: LetterStatus,
        to: LetterStatus,
    },

    #[error("letter is no longer editable")]
    NotEditable,

    #[error("letter has already been delivered")]
    AlreadyDelivered,

    #[error("unknown receivers: {}", .0.join(", "))]
    UnknownReceivers(Vec<String>),

    /// Linked memories or diaries that don't belong to the sender.
    #[error("{field} contains items you do not own")]
    ForeignLinks { field: &'static str },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("blocking task failed: {0}")]
    Task(#[from] JoinError),
}

/// Why one delivery attempt failed. Recorded on the letter; never fatal to
/// the sweep.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no recipients")]
    NoRecipients,

    #[error("attachment is {size} bytes, limit is {max}")]
    AttachmentTooLarge { size: u64, max: u64 },

    #[error("attachment {path} is outside the media directory")]
    AttachmentOutsideMedia { path: String },

    #[error("attachment {path} unreadable: {source}")]
    AttachmentUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("recipient lookup failed: {0}")]
    Lookup(#[from] DbError),

    #[error("blocking task failed: {0}")]
    Task(#[from] JoinError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
