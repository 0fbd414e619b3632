/// Database row types and write payloads.
/// Rows carry what the API never exposes (password hashes, sealed diary
/// text); everything else converts straight into `dearme-types` models.
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use dearme_types::models::{LetterStatus, Location, User};

pub struct UserRow {
    pub user: User,
    pub password: String,
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

/// Everything a sender controls on a letter.
#[derive(Debug, Clone)]
pub struct LetterContent {
    pub receiver_ids: Vec<Uuid>,
    pub external_emails: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<String>,
    pub delivery_date: DateTime<Utc>,
    pub grace_period_hours: u32,
    pub memory_ids: Vec<Uuid>,
    pub diary_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewLetter {
    pub sender_id: Uuid,
    pub content: LetterContent,
    pub status: LetterStatus,
    pub locked_at: Option<DateTime<Utc>>,
}

/// Diary entry as stored: text still sealed.
#[derive(Debug, Clone)]
pub struct DiaryRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub entry_date: NaiveDate,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub memory_ids: Vec<Uuid>,
    pub photos: Vec<String>,
    pub locations: Vec<Location>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DiaryWrite {
    pub entry_date: NaiveDate,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub memory_ids: Vec<Uuid>,
    pub photos: Vec<String>,
    pub locations: Vec<String>,
}

/// A scheduled letter's armed edit window, as seen by the lock sweep.
#[derive(Debug, Clone, Copy)]
pub struct EditWindow {
    pub letter_id: Uuid,
    pub locked_at: DateTime<Utc>,
    pub grace_period_hours: u32,
}
