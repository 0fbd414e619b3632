use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<NaiveDate>,
    pub timezone: String,
    pub is_active: bool,
    pub is_email_verified: bool,
    /// Show the full name instead of the username to other people.
    pub show_full_name: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn display_name(&self) -> String {
        let full = self.full_name();
        if self.show_full_name && !full.is_empty() {
            full
        } else {
            self.username.clone()
        }
    }
}

// -- Tags & locations --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// -- Memories --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Milestone,
    Family,
    Travel,
    Achievement,
    Everyday,
    Other,
}

impl MemoryCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Milestone => "milestone",
            Self::Family => "family",
            Self::Travel => "travel",
            Self::Achievement => "achievement",
            Self::Everyday => "everyday",
            Self::Other => "other",
        }
    }
}

impl FromStr for MemoryCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "milestone" => Ok(Self::Milestone),
            "family" => Ok(Self::Family),
            "travel" => Ok(Self::Travel),
            "achievement" => Ok(Self::Achievement),
            "everyday" => Ok(Self::Everyday),
            "other" => Ok(Self::Other),
            _ => Err(UnknownVariant {
                kind: "memory category",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: MemoryCategory,
    pub is_private: bool,
    /// Excluded from any posthumous sharing.
    pub take_to_grave: bool,
    pub photo: Option<String>,
    pub audio: Option<String>,
    pub video: Option<String>,
    pub memory_date: NaiveDate,
    pub location: Option<Location>,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Diaries --

/// A diary entry with its text fields already decrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyDiary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub entry_date: NaiveDate,
    pub content: String,
    pub gratitude: String,
    pub mood: String,
    pub memory_ids: Vec<Uuid>,
    pub photos: Vec<String>,
    pub locations: Vec<Location>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Letters --

/// Letter status. Variants are declared in lifecycle order, so `Ord` is the
/// only direction a letter may move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterStatus {
    Draft,
    Scheduled,
    Locked,
    Delivered,
}

impl LetterStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Locked => "locked",
            Self::Delivered => "delivered",
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    /// Staying in place is allowed for every status except `Delivered`.
    pub fn can_move_to(self, next: LetterStatus) -> bool {
        match self {
            Self::Delivered => false,
            _ => next >= self,
        }
    }
}

impl fmt::Display for LetterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "locked" => Ok(Self::Locked),
            "delivered" => Ok(Self::Delivered),
            _ => Err(UnknownVariant {
                kind: "letter status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Letter {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_ids: Vec<Uuid>,
    /// Comma-separated free text, parsed at delivery time.
    pub external_emails: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<String>,
    pub delivery_date: DateTime<Utc>,
    pub status: LetterStatus,
    pub locked_at: Option<DateTime<Utc>>,
    pub grace_period_hours: u32,
    pub memory_ids: Vec<Uuid>,
    pub diary_ids: Vec<Uuid>,
    pub delivery_attempts: u32,
    pub last_delivery_error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Letter {
    pub const DEFAULT_GRACE_PERIOD_HOURS: u32 = 48;

    /// End of the edit window, if one has been armed.
    pub fn edit_window_closes_at(&self) -> Option<DateTime<Utc>> {
        self.locked_at
            .map(|t| t + Duration::hours(i64::from(self.grace_period_hours)))
    }

    pub fn is_editable_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            LetterStatus::Draft => true,
            LetterStatus::Scheduled => match self.edit_window_closes_at() {
                None => true,
                Some(closes_at) => now < closes_at,
            },
            LetterStatus::Locked | LetterStatus::Delivered => false,
        }
    }

    pub fn is_editable(&self) -> bool {
        self.is_editable_at(Utc::now())
    }
}
