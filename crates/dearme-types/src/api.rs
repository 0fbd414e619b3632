use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Letter, MemoryCategory};
use crate::normalize::{parse_external_emails, split_locations, split_tags};
use crate::validation::{
    FieldErrors, Validate, is_contained_path, is_known_timezone, is_valid_email, required_text,
};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const PASSWORD_MIN: usize = 8;
pub const SUBJECT_MAX: usize = 200;
pub const TITLE_MAX: usize = 200;
/// One year.
pub const GRACE_PERIOD_MAX_HOURS: u32 = 24 * 365;

// -- JWT Claims --

/// Bearer token claims for authenticated API calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl Validate for SignupRequest {
    type Valid = NewAccount;

    fn validate(self) -> Result<NewAccount, FieldErrors> {
        let mut errors = FieldErrors::new();

        let username = self.username.trim().to_string();
        let len = username.chars().count();
        if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
            errors.push(
                "username",
                format!("Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters."),
            );
        } else if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            errors.push(
                "username",
                "Username may only contain letters, digits and . _ - characters.",
            );
        }

        let email = self.email.trim().to_string();
        if !is_valid_email(&email) {
            errors.push("email", "Enter a valid email address.");
        }

        check_new_password(&mut errors, &self.password, &self.password_confirm);

        errors.finish(NewAccount {
            username,
            email,
            password: self.password,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
        })
    }
}

fn check_new_password(errors: &mut FieldErrors, password: &str, confirm: &str) {
    if password.chars().count() < PASSWORD_MIN {
        errors.push(
            "password",
            format!("Password must be at least {PASSWORD_MIN} characters."),
        );
    }
    if password != confirm {
        errors.push("password_confirm", "The two password fields didn't match.");
    }
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub message: String,
}

/// Log in with either the username or the email address.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub token: String,
    pub password: String,
}

impl Validate for ResetPasswordRequest {
    type Valid = PasswordReset;

    fn validate(self) -> Result<PasswordReset, FieldErrors> {
        let mut errors = FieldErrors::new();
        check_new_password(&mut errors, &self.password, &self.password_confirm);
        errors.finish(PasswordReset {
            token: self.token,
            password: self.password,
        })
    }
}

/// Flash-style confirmation returned by actions with no other payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// -- Profile --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub birthday: Option<NaiveDate>,
    pub timezone: String,
    #[serde(default)]
    pub show_full_name: bool,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<NaiveDate>,
    pub timezone: String,
    pub show_full_name: bool,
}

impl Validate for UpdateProfileRequest {
    type Valid = ProfileUpdate;

    fn validate(self) -> Result<ProfileUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();
        let timezone = self.timezone.trim().to_string();
        if !is_known_timezone(&timezone) {
            errors.push("timezone", "Select a valid timezone.");
        }
        if let Some(birthday) = self.birthday {
            if birthday > Utc::now().date_naive() {
                errors.push("birthday", "Birthday cannot be in the future.");
            }
        }
        errors.finish(ProfileUpdate {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            birthday: self.birthday,
            timezone,
            show_full_name: self.show_full_name,
        })
    }
}

// -- Letters --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LetterRequest {
    pub subject: String,
    pub body: String,
    pub delivery_date: DateTime<Utc>,
    pub attachment: Option<String>,
    /// Usernames of internal receivers.
    #[serde(default)]
    pub receivers: Vec<String>,
    #[serde(default)]
    pub external_emails: String,
    pub grace_period_hours: Option<u32>,
    #[serde(default)]
    pub memory_ids: Vec<Uuid>,
    #[serde(default)]
    pub diary_ids: Vec<Uuid>,
    /// Schedule right away instead of saving a draft.
    #[serde(default)]
    pub schedule: bool,
}

#[derive(Debug, Clone)]
pub struct LetterDraft {
    pub subject: String,
    pub body: String,
    pub delivery_date: DateTime<Utc>,
    pub attachment: Option<String>,
    pub receivers: Vec<String>,
    pub external_emails: String,
    pub grace_period_hours: u32,
    pub memory_ids: Vec<Uuid>,
    pub diary_ids: Vec<Uuid>,
    pub schedule: bool,
}

impl Validate for LetterRequest {
    type Valid = LetterDraft;

    fn validate(self) -> Result<LetterDraft, FieldErrors> {
        let mut errors = FieldErrors::new();

        let subject = required_text(&mut errors, "subject", &self.subject, SUBJECT_MAX);
        if self.body.trim().is_empty() {
            errors.push("body", "This field is required.");
        }

        let invalid: Vec<String> = parse_external_emails(&self.external_emails)
            .into_iter()
            .filter(|addr| !is_valid_email(addr))
            .collect();
        if !invalid.is_empty() {
            errors.push(
                "external_emails",
                format!("Invalid email address: {}", invalid.join(", ")),
            );
        }

        let grace_period_hours = self
            .grace_period_hours
            .unwrap_or(Letter::DEFAULT_GRACE_PERIOD_HOURS);
        if grace_period_hours > GRACE_PERIOD_MAX_HOURS {
            errors.push(
                "grace_period_hours",
                format!("Grace period cannot exceed {GRACE_PERIOD_MAX_HOURS} hours."),
            );
        }

        let mut receivers: Vec<String> = Vec::new();
        for name in self.receivers.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            if !receivers.iter().any(|r| r.eq_ignore_ascii_case(name)) {
                receivers.push(name.to_string());
            }
        }

        let attachment = self
            .attachment
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        if attachment.as_deref().is_some_and(|a| !is_contained_path(a)) {
            errors.push(
                "attachment",
                "Attachment must be a relative path inside the media directory.",
            );
        }

        errors.finish(LetterDraft {
            subject,
            body: self.body,
            delivery_date: self.delivery_date,
            attachment,
            receivers,
            external_emails: self.external_emails.trim().to_string(),
            grace_period_hours,
            memory_ids: dedup_ids(self.memory_ids),
            diary_ids: dedup_ids(self.diary_ids),
            schedule: self.schedule,
        })
    }
}

fn dedup_ids(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(*id));
    ids
}

/// A letter as shown to its sender.
#[derive(Debug, Serialize, Deserialize)]
pub struct LetterView {
    #[serde(flatten)]
    pub letter: Letter,
    pub editable: bool,
    pub edit_window_closes_at: Option<DateTime<Utc>>,
}

impl LetterView {
    pub fn at(letter: Letter, now: DateTime<Utc>) -> Self {
        Self {
            editable: letter.is_editable_at(now),
            edit_window_closes_at: letter.edit_window_closes_at(),
            letter,
        }
    }
}

/// Result of an edit attempt. A closed letter comes back read-only instead
/// of as an error.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LetterEditResponse {
    Updated { letter: LetterView },
    Locked { letter: LetterView },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendLetterResponse {
    pub delivered: bool,
    pub message: String,
}

// -- Memories --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: MemoryCategory,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub take_to_grave: bool,
    pub photo: Option<String>,
    pub audio: Option<String>,
    pub video: Option<String>,
    pub memory_date: NaiveDate,
    /// Whitespace-separated, e.g. `"#family #summer"`.
    #[serde(default)]
    pub tags: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MemoryDraft {
    pub title: String,
    pub description: String,
    pub category: MemoryCategory,
    pub is_private: bool,
    pub take_to_grave: bool,
    pub photo: Option<String>,
    pub audio: Option<String>,
    pub video: Option<String>,
    pub memory_date: NaiveDate,
    pub tags: Vec<String>,
    pub location: Option<String>,
}

impl Validate for MemoryRequest {
    type Valid = MemoryDraft;

    fn validate(self) -> Result<MemoryDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = required_text(&mut errors, "title", &self.title, TITLE_MAX);

        let location = match self.location.as_deref().map(split_locations) {
            Some(names) if names.len() > 1 => {
                errors.push("location", "A memory can only have one location.");
                names.into_iter().next()
            }
            Some(names) => names.into_iter().next(),
            None => None,
        };

        errors.finish(MemoryDraft {
            title,
            description: self.description.trim().to_string(),
            category: self.category,
            is_private: self.is_private,
            take_to_grave: self.take_to_grave,
            photo: non_blank(self.photo),
            audio: non_blank(self.audio),
            video: non_blank(self.video),
            memory_date: self.memory_date,
            tags: split_tags(&self.tags),
            location,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// -- Diaries --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiaryRequest {
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub gratitude: String,
    #[serde(default)]
    pub mood: String,
    #[serde(default)]
    pub memory_ids: Vec<Uuid>,
    #[serde(default)]
    pub photos: Vec<String>,
    /// Comma-separated location names.
    #[serde(default)]
    pub locations: String,
}

#[derive(Debug, Clone)]
pub struct DiaryDraft {
    pub entry_date: NaiveDate,
    pub content: String,
    pub gratitude: String,
    pub mood: String,
    pub memory_ids: Vec<Uuid>,
    pub photos: Vec<String>,
    pub locations: Vec<String>,
}

impl Validate for DiaryRequest {
    type Valid = DiaryDraft;

    fn validate(self) -> Result<DiaryDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.content.trim().is_empty()
            && self.gratitude.trim().is_empty()
            && self.mood.trim().is_empty()
        {
            errors.push("content", "Write something before saving the entry.");
        }
        if self.entry_date > Utc::now().date_naive() {
            errors.push("entry_date", "Diary entries cannot be dated in the future.");
        }

        errors.finish(DiaryDraft {
            entry_date: self.entry_date,
            content: self.content,
            gratitude: self.gratitude,
            mood: self.mood.trim().to_string(),
            memory_ids: dedup_ids(self.memory_ids),
            photos: self
                .photos
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            locations: split_locations(&self.locations),
        })
    }
}
