use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use dearme_types::api::ProfileUpdate;
use dearme_types::models::User;

use crate::error::is_unique_violation;
use crate::models::{NewUser, UserRow};
use crate::time::{date, parse_date, parse_ts, ts};
use crate::{Database, DbError, Result, parse_id, placeholders};

const USER_COLUMNS: &str = "id, username, email, password, first_name, last_name, birthday, \
     timezone, is_active, is_email_verified, show_full_name, created_at";

impl Database {
    /// New accounts start inactive and unverified.
    pub fn create_user(&self, new: &NewUser<'_>) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, first_name, last_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    new.username,
                    new.email,
                    new.password_hash,
                    new.first_name,
                    new.last_name,
                    ts(now),
                ],
            )
            .map_err(|e| {
                if !is_unique_violation(&e) {
                    return DbError::Sqlite(e);
                }
                let field = match &e {
                    rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("users.email") => {
                        "email"
                    }
                    _ => "username",
                };
                DbError::Conflict { field }
            })?;

            query_user(conn, "id = ?1", &id.to_string())?
                .map(|row| row.user)
                .ok_or(DbError::NotFound)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id.to_string()))
    }

    /// Case-insensitive lookup by username or email address.
    pub fn get_user_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1 OR email = ?1", login.trim()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email.trim()))
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE email = ?1", [email.trim()], |r| r.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Resolve usernames to users. Unknown names are simply absent from the
    /// result; callers compare lengths to report them.
    pub fn get_users_by_usernames(&self, usernames: &[String]) -> Result<Vec<User>> {
        if usernames.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE username IN ({}) ORDER BY username",
                placeholders(1, usernames.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(usernames.iter()), read_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|raw| raw.into_row().map(|row| row.user))
                .collect()
        })
    }

    /// Email addresses of the given users, skipping blanks.
    pub fn get_user_emails(&self, ids: &[Uuid]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT email FROM users WHERE id IN ({}) AND TRIM(email) != '' ORDER BY email",
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let emails = stmt
                .query_map(
                    rusqlite::params_from_iter(ids.iter().map(|id| id.to_string())),
                    |r| r.get::<_, String>(0),
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(emails)
        })
    }

    /// Activate the account and mark its email verified.
    /// Returns false when the user no longer exists.
    pub fn mark_email_verified(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET is_active = 1, is_email_verified = 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                params![id.to_string(), password_hash],
            )?;
            Ok(n > 0)
        })
    }

    pub fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<User> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users
                 SET first_name = ?2, last_name = ?3, birthday = ?4, timezone = ?5, show_full_name = ?6
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    update.first_name,
                    update.last_name,
                    update.birthday.map(date),
                    update.timezone,
                    update.show_full_name,
                ],
            )?;
            if n == 0 {
                return Err(DbError::NotFound);
            }
            query_user(conn, "id = ?1", &id.to_string())?
                .map(|row| row.user)
                .ok_or(DbError::NotFound)
        })
    }
}

/// Raw column values, converted after the statement finishes so parse
/// failures surface as [`DbError::Corrupt`] instead of rusqlite errors.
struct RawUser {
    id: String,
    username: String,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    birthday: Option<String>,
    timezone: String,
    is_active: bool,
    is_email_verified: bool,
    show_full_name: bool,
    created_at: String,
}

impl RawUser {
    fn into_row(self) -> Result<UserRow> {
        Ok(UserRow {
            user: User {
                id: parse_id(&self.id)?,
                username: self.username,
                email: self.email,
                first_name: self.first_name,
                last_name: self.last_name,
                birthday: self.birthday.as_deref().map(parse_date).transpose()?,
                timezone: self.timezone,
                is_active: self.is_active,
                is_email_verified: self.is_email_verified,
                show_full_name: self.show_full_name,
                created_at: parse_ts(&self.created_at)?,
            },
            password: self.password,
        })
    }
}

fn read_user(row: &Row<'_>) -> rusqlite::Result<RawUser> {
    Ok(RawUser {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        birthday: row.get(6)?,
        timezone: row.get(7)?,
        is_active: row.get(8)?,
        is_email_verified: row.get(9)?,
        show_full_name: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn query_user(conn: &Connection, filter: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter} LIMIT 1");
    let raw = conn.query_row(&sql, [value], read_user).optional()?;
    raw.map(RawUser::into_row).transpose()
}

