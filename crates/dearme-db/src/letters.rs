use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use uuid::Uuid;

use dearme_types::models::{Letter, LetterStatus};

use crate::models::{EditWindow, LetterContent, NewLetter};
use crate::time::{parse_opt_ts, parse_ts, ts};
use crate::{Database, DbError, Result, parse_id, placeholders};

const LETTER_COLUMNS: &str = "id, sender_id, external_emails, subject, body, attachment, \
     delivery_date, status, locked_at, grace_period_hours, delivery_attempts, \
     last_delivery_error, delivered_at, created_at, updated_at";

/// Longest error text kept on a letter after a failed delivery.
const MAX_ERROR_LEN: usize = 500;

impl Database {
    // -- Sender-facing CRUD --

    pub fn insert_letter(&self, new: &NewLetter) -> Result<Letter> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO letters (id, sender_id, external_emails, subject, body, attachment,
                                      delivery_date, status, locked_at, grace_period_hours,
                                      created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    id.to_string(),
                    new.sender_id.to_string(),
                    new.content.external_emails,
                    new.content.subject,
                    new.content.body,
                    new.content.attachment,
                    ts(new.content.delivery_date),
                    new.status.as_str(),
                    new.locked_at.map(ts),
                    new.content.grace_period_hours,
                    ts(now),
                ],
            )?;
            write_links(&tx, &id.to_string(), &new.content)?;
            tx.commit()?;

            query_letter(conn, "id = ?1", &[&id.to_string()])?.ok_or(DbError::NotFound)
        })
    }

    pub fn get_letter(&self, id: Uuid) -> Result<Option<Letter>> {
        self.with_conn(|conn| query_letter(conn, "id = ?1", &[&id.to_string()]))
    }

    pub fn get_letter_for_sender(&self, id: Uuid, sender_id: Uuid) -> Result<Option<Letter>> {
        self.with_conn(|conn| {
            query_letter(
                conn,
                "id = ?1 AND sender_id = ?2",
                &[&id.to_string(), &sender_id.to_string()],
            )
        })
    }

    /// The sender's letters, newest first.
    pub fn list_letters_for_sender(&self, sender_id: Uuid) -> Result<Vec<Letter>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {LETTER_COLUMNS} FROM letters WHERE sender_id = ?1 ORDER BY created_at DESC"
            );
            query_letters(conn, &sql, &[sender_id.to_string()])
        })
    }

    /// Overwrite a letter's content and move it to `status`, but only while
    /// it still has `expected` status. Returns false when the status changed
    /// underneath the caller.
    pub fn update_letter(
        &self,
        id: Uuid,
        expected: LetterStatus,
        content: &LetterContent,
        status: LetterStatus,
        locked_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx.execute(
                "UPDATE letters
                 SET external_emails = ?3, subject = ?4, body = ?5, attachment = ?6,
                     delivery_date = ?7, grace_period_hours = ?8, status = ?9, locked_at = ?10,
                     updated_at = ?11
                 WHERE id = ?1 AND status = ?2",
                params![
                    id.to_string(),
                    expected.as_str(),
                    content.external_emails,
                    content.subject,
                    content.body,
                    content.attachment,
                    ts(content.delivery_date),
                    content.grace_period_hours,
                    status.as_str(),
                    locked_at.map(ts),
                    ts(Utc::now()),
                ],
            )?;
            if n == 0 {
                return Ok(false);
            }

            let letter_id = id.to_string();
            for table in ["letter_receivers", "letter_memories", "letter_diaries"] {
                tx.execute(&format!("DELETE FROM {table} WHERE letter_id = ?1"), [&letter_id])?;
            }
            write_links(&tx, &letter_id, content)?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Delete a letter that has not been locked or delivered yet.
    pub fn delete_letter(&self, id: Uuid, sender_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM letters
                 WHERE id = ?1 AND sender_id = ?2 AND status IN ('draft', 'scheduled')",
                params![id.to_string(), sender_id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    // -- Lifecycle transitions --

    /// draft → scheduled, arming the edit window at `now`.
    pub fn schedule_letter(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE letters SET status = 'scheduled', locked_at = ?2, updated_at = ?2
                 WHERE id = ?1 AND status = 'draft'",
                params![id.to_string(), ts(now)],
            )?;
            Ok(n > 0)
        })
    }

    /// draft/scheduled → locked. A letter that is already locked or
    /// delivered is left alone and false is returned.
    pub fn lock_letter(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE letters SET status = 'locked', locked_at = ?2, updated_at = ?2
                 WHERE id = ?1 AND status IN ('draft', 'scheduled')",
                params![id.to_string(), ts(now)],
            )?;
            Ok(n > 0)
        })
    }

    /// Scheduled letters with an armed edit window.
    pub fn scheduled_edit_windows(&self) -> Result<Vec<EditWindow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, locked_at, grace_period_hours FROM letters
                 WHERE status = 'scheduled' AND locked_at IS NOT NULL",
            )?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u32>(2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            raw.into_iter()
                .map(|(id, locked_at, grace)| {
                    Ok(EditWindow {
                        letter_id: parse_id(&id)?,
                        locked_at: parse_ts(&locked_at)?,
                        grace_period_hours: grace,
                    })
                })
                .collect()
        })
    }

    // -- Delivery --

    /// Letters in one of `statuses` whose delivery date has passed, oldest
    /// delivery date first.
    pub fn due_letters(&self, statuses: &[LetterStatus], now: DateTime<Utc>) -> Result<Vec<Letter>> {
        if statuses.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {LETTER_COLUMNS} FROM letters
                 WHERE delivery_date <= ?1 AND status IN ({})
                 ORDER BY delivery_date",
                placeholders(2, statuses.len())
            );
            let mut values = vec![ts(now)];
            values.extend(statuses.iter().map(|s| s.as_str().to_string()));
            query_letters(conn, &sql, &values)
        })
    }

    /// Take the delivery lease on a letter. Succeeds only when the letter
    /// is still in one of `statuses` and nobody else holds a live lease.
    /// Returns the claim token the later outcome must present.
    pub fn claim_letter(
        &self,
        id: Uuid,
        statuses: &[LetterStatus],
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        if statuses.is_empty() {
            return Ok(None);
        }

        let claim = Uuid::new_v4();
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE letters SET claimed_until = ?3, claim_token = ?4
                 WHERE id = ?1
                   AND (claimed_until IS NULL OR claimed_until <= ?2)
                   AND status IN ({})",
                placeholders(5, statuses.len())
            );
            let mut values = vec![id.to_string(), ts(now), ts(lease_until), claim.to_string()];
            values.extend(statuses.iter().map(|s| s.as_str().to_string()));
            let n = conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok((n > 0).then_some(claim))
        })
    }

    /// Final transition, made by the holder of `claim`. Clears the lease
    /// and counts the attempt. False when the claim was lost or the letter
    /// is already delivered.
    pub fn mark_delivered(&self, id: Uuid, claim: Uuid, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE letters
                 SET status = 'delivered', delivered_at = ?3, updated_at = ?3,
                     claimed_until = NULL, claim_token = NULL, last_delivery_error = NULL,
                     delivery_attempts = delivery_attempts + 1
                 WHERE id = ?1 AND claim_token = ?2 AND status != 'delivered'",
                params![id.to_string(), claim.to_string(), ts(now)],
            )?;
            Ok(n > 0)
        })
    }

    /// Record a failed attempt and release the lease held by `claim`;
    /// status is untouched so the next sweep picks the letter up again.
    pub fn record_delivery_failure(&self, id: Uuid, claim: Uuid, error: &str) -> Result<bool> {
        let error: String = error.chars().take(MAX_ERROR_LEN).collect();
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE letters
                 SET claimed_until = NULL, claim_token = NULL, last_delivery_error = ?3,
                     delivery_attempts = delivery_attempts + 1
                 WHERE id = ?1 AND claim_token = ?2 AND status != 'delivered'",
                params![id.to_string(), claim.to_string(), error],
            )?;
            Ok(n > 0)
        })
    }
}

fn write_links(tx: &Transaction<'_>, letter_id: &str, content: &LetterContent) -> Result<()> {
    for (table, column, ids) in [
        ("letter_receivers", "user_id", &content.receiver_ids),
        ("letter_memories", "memory_id", &content.memory_ids),
        ("letter_diaries", "diary_id", &content.diary_ids),
    ] {
        let sql = format!("INSERT OR IGNORE INTO {table} (letter_id, {column}) VALUES (?1, ?2)");
        let mut stmt = tx.prepare(&sql)?;
        for id in ids {
            stmt.execute(params![letter_id, id.to_string()])?;
        }
    }
    Ok(())
}

struct RawLetter {
    id: String,
    sender_id: String,
    external_emails: String,
    subject: String,
    body: String,
    attachment: Option<String>,
    delivery_date: String,
    status: String,
    locked_at: Option<String>,
    grace_period_hours: u32,
    delivery_attempts: u32,
    last_delivery_error: Option<String>,
    delivered_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_letter(row: &Row<'_>) -> rusqlite::Result<RawLetter> {
    Ok(RawLetter {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        external_emails: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        attachment: row.get(5)?,
        delivery_date: row.get(6)?,
        status: row.get(7)?,
        locked_at: row.get(8)?,
        grace_period_hours: row.get(9)?,
        delivery_attempts: row.get(10)?,
        last_delivery_error: row.get(11)?,
        delivered_at: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

impl RawLetter {
    fn into_letter(self, conn: &Connection) -> Result<Letter> {
        Ok(Letter {
            receiver_ids: linked_ids(conn, "letter_receivers", "user_id", &self.id)?,
            memory_ids: linked_ids(conn, "letter_memories", "memory_id", &self.id)?,
            diary_ids: linked_ids(conn, "letter_diaries", "diary_id", &self.id)?,
            id: parse_id(&self.id)?,
            sender_id: parse_id(&self.sender_id)?,
            external_emails: self.external_emails,
            subject: self.subject,
            body: self.body,
            attachment: self.attachment,
            delivery_date: parse_ts(&self.delivery_date)?,
            status: self.status.parse().map_err(DbError::corrupt)?,
            locked_at: parse_opt_ts(self.locked_at)?,
            grace_period_hours: self.grace_period_hours,
            delivery_attempts: self.delivery_attempts,
            last_delivery_error: self.last_delivery_error,
            delivered_at: parse_opt_ts(self.delivered_at)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

fn linked_ids(conn: &Connection, table: &str, column: &str, letter_id: &str) -> Result<Vec<Uuid>> {
    let sql = format!("SELECT {column} FROM {table} WHERE letter_id = ?1 ORDER BY {column}");
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map([letter_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raw.iter().map(|id| parse_id(id)).collect()
}

fn query_letter(conn: &Connection, filter: &str, values: &[&String]) -> Result<Option<Letter>> {
    let sql = format!("SELECT {LETTER_COLUMNS} FROM letters WHERE {filter}");
    let raw = conn
        .query_row(&sql, params_from_iter(values.iter()), read_letter)
        .optional()?;
    raw.map(|r| r.into_letter(conn)).transpose()
}

fn query_letters(conn: &Connection, sql: &str, values: &[String]) -> Result<Vec<Letter>> {
    let mut stmt = conn.prepare(sql)?;
    let raw = stmt
        .query_map(params_from_iter(values.iter()), read_letter)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raw.into_iter().map(|r| r.into_letter(conn)).collect()
}
