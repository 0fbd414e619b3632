use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use dearme_db::Database;
use dearme_db::models::{LetterContent, NewLetter};
use dearme_types::api::LetterDraft;
use dearme_types::models::{Letter, LetterStatus};

use crate::error::LetterError;

/// Result of an edit attempt.
#[derive(Debug)]
pub enum EditOutcome {
    Updated(Letter),
    /// The edit window had closed. The letter is returned unchanged.
    Locked(Letter),
}

/// User-facing letter transitions. All methods are blocking; async callers
/// run them on `spawn_blocking`.
#[derive(Clone)]
pub struct LetterService {
    db: Arc<Database>,
}

impl LetterService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn list(&self, sender_id: Uuid) -> Result<Vec<Letter>, LetterError> {
        Ok(self.db.list_letters_for_sender(sender_id)?)
    }

    pub fn get(&self, sender_id: Uuid, id: Uuid) -> Result<Letter, LetterError> {
        self.db
            .get_letter_for_sender(id, sender_id)?
            .ok_or(LetterError::NotFound)
    }

    /// New letters start as drafts unless the caller asks to schedule right
    /// away, which also arms the edit window.
    pub fn create(
        &self,
        sender_id: Uuid,
        draft: &LetterDraft,
        now: DateTime<Utc>,
    ) -> Result<Letter, LetterError> {
        let content = self.resolve_content(sender_id, draft)?;
        let (status, locked_at) = if draft.schedule {
            (LetterStatus::Scheduled, Some(now))
        } else {
            (LetterStatus::Draft, None)
        };

        let letter = self.db.insert_letter(&NewLetter {
            sender_id,
            content,
            status,
            locked_at,
        })?;
        info!(letter_id = %letter.id, %status, "letter created");
        Ok(letter)
    }

    /// Replace the letter's content while it is editable. A draft may be
    /// scheduled by the edit; any other status is kept.
    pub fn edit(
        &self,
        sender_id: Uuid,
        id: Uuid,
        draft: &LetterDraft,
        now: DateTime<Utc>,
    ) -> Result<EditOutcome, LetterError> {
        let current = self.get(sender_id, id)?;
        if !current.is_editable_at(now) {
            return Ok(EditOutcome::Locked(current));
        }

        let content = self.resolve_content(sender_id, draft)?;
        let (status, locked_at) = match current.status {
            LetterStatus::Draft if draft.schedule => (LetterStatus::Scheduled, Some(now)),
            status => (status, current.locked_at),
        };
        ensure_move(current.status, status)?;

        if self
            .db
            .update_letter(id, current.status, &content, status, locked_at)?
        {
            debug!(letter_id = %id, %status, "letter edited");
            return Ok(EditOutcome::Updated(self.get(sender_id, id)?));
        }

        // Status moved underneath us (a sweep locked or delivered it).
        Ok(EditOutcome::Locked(self.get(sender_id, id)?))
    }

    /// draft → scheduled. Scheduling a scheduled letter changes nothing.
    pub fn schedule(
        &self,
        sender_id: Uuid,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Letter, LetterError> {
        let letter = self.get(sender_id, id)?;
        if letter.status == LetterStatus::Scheduled {
            return Ok(letter);
        }
        ensure_move(letter.status, LetterStatus::Scheduled)?;

        if !self.db.schedule_letter(id, now)? {
            let latest = self.get(sender_id, id)?;
            if latest.status != LetterStatus::Scheduled {
                return Err(LetterError::InvalidTransition {
                    from: latest.status,
                    to: LetterStatus::Scheduled,
                });
            }
            return Ok(latest);
        }
        info!(letter_id = %id, "letter scheduled");
        self.get(sender_id, id)
    }

    /// Lock a letter. Locking a locked letter keeps its original
    /// `locked_at`; locking a delivered letter is an error.
    pub fn lock(&self, sender_id: Uuid, id: Uuid, now: DateTime<Utc>) -> Result<Letter, LetterError> {
        let letter = self.get(sender_id, id)?;
        if letter.status == LetterStatus::Locked {
            return Ok(letter);
        }
        ensure_move(letter.status, LetterStatus::Locked)?;

        if !self.db.lock_letter(id, now)? {
            let latest = self.get(sender_id, id)?;
            ensure_move(latest.status, LetterStatus::Locked)?;
            return Ok(latest);
        }
        info!(letter_id = %id, "letter locked");
        self.get(sender_id, id)
    }

    pub fn delete(&self, sender_id: Uuid, id: Uuid, now: DateTime<Utc>) -> Result<(), LetterError> {
        let letter = self.get(sender_id, id)?;
        if !letter.is_editable_at(now) || !self.db.delete_letter(id, sender_id)? {
            return Err(LetterError::NotEditable);
        }
        info!(letter_id = %id, "letter deleted");
        Ok(())
    }

    /// Lock every scheduled letter whose edit window has closed by `now`.
    /// Returns how many were locked.
    pub fn lock_expired(&self, now: DateTime<Utc>) -> Result<usize, LetterError> {
        let mut locked = 0;
        for window in self.db.scheduled_edit_windows()? {
            let closes_at =
                window.locked_at + chrono::Duration::hours(i64::from(window.grace_period_hours));
            if closes_at <= now && self.db.lock_letter(window.letter_id, now)? {
                debug!(letter_id = %window.letter_id, "edit window closed, letter locked");
                locked += 1;
            }
        }
        Ok(locked)
    }

    /// Resolve receiver usernames and check that linked memories and
    /// diaries belong to the sender.
    fn resolve_content(
        &self,
        sender_id: Uuid,
        draft: &LetterDraft,
    ) -> Result<LetterContent, LetterError> {
        let users = self.db.get_users_by_usernames(&draft.receivers)?;
        let unknown: Vec<String> = draft
            .receivers
            .iter()
            .filter(|name| !users.iter().any(|u| u.username.eq_ignore_ascii_case(name)))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(LetterError::UnknownReceivers(unknown));
        }

        let owned = self.db.owned_memory_ids(sender_id, &draft.memory_ids)?;
        if owned.len() != draft.memory_ids.len() {
            return Err(LetterError::ForeignLinks { field: "memory_ids" });
        }
        let owned = self.db.owned_diary_ids(sender_id, &draft.diary_ids)?;
        if owned.len() != draft.diary_ids.len() {
            return Err(LetterError::ForeignLinks { field: "diary_ids" });
        }

        Ok(LetterContent {
            receiver_ids: users.iter().map(|u| u.id).collect(),
            external_emails: draft.external_emails.clone(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
            attachment: draft.attachment.clone(),
            delivery_date: draft.delivery_date,
            grace_period_hours: draft.grace_period_hours,
            memory_ids: draft.memory_ids.clone(),
            diary_ids: draft.diary_ids.clone(),
        })
    }
}

fn ensure_move(from: LetterStatus, to: LetterStatus) -> Result<(), LetterError> {
    if from.can_move_to(to) {
        Ok(())
    } else {
        Err(LetterError::InvalidTransition { from, to })
    }
}
