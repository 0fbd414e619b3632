use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use uuid::Uuid;

use dearme_types::models::Location;

use crate::error::conflict_on;
use crate::memories::owned_ids;
use crate::models::{DiaryRow, DiaryWrite};
use crate::tags::{RawLocation, get_or_create_location, read_location};
use crate::time::{date, parse_date, parse_ts, ts};
use crate::{Database, DbError, Result, parse_id};

const DIARY_COLUMNS: &str = "id, owner_id, entry_date, ciphertext, nonce, created_at, updated_at";

impl Database {
    /// Fails with `Conflict { field: "entry_date" }` when the owner already
    /// has an entry for that date.
    pub fn create_diary(&self, owner_id: Uuid, write: &DiaryWrite) -> Result<DiaryRow> {
        let id = Uuid::new_v4().to_string();
        let now = ts(Utc::now());

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO diaries (id, owner_id, entry_date, ciphertext, nonce, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id,
                    owner_id.to_string(),
                    date(write.entry_date),
                    write.ciphertext,
                    write.nonce,
                    now,
                ],
            )
            .map_err(conflict_on("entry_date"))?;
            write_links(&tx, &id, write)?;
            tx.commit()?;

            query_diary(conn, "id = ?1", &[&id])?.ok_or(DbError::NotFound)
        })
    }

    pub fn get_diary(&self, owner_id: Uuid, id: Uuid) -> Result<Option<DiaryRow>> {
        self.with_conn(|conn| {
            query_diary(
                conn,
                "id = ?1 AND owner_id = ?2",
                &[&id.to_string(), &owner_id.to_string()],
            )
        })
    }

    /// The owner's entries, newest date first.
    pub fn list_diaries(&self, owner_id: Uuid) -> Result<Vec<DiaryRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {DIARY_COLUMNS} FROM diaries WHERE owner_id = ?1 ORDER BY entry_date DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let raw = stmt
                .query_map([owner_id.to_string()], read_diary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            raw.into_iter().map(|r| r.into_row(conn)).collect()
        })
    }

    pub fn update_diary(
        &self,
        owner_id: Uuid,
        id: Uuid,
        write: &DiaryWrite,
    ) -> Result<Option<DiaryRow>> {
        let diary_id = id.to_string();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx
                .execute(
                    "UPDATE diaries
                     SET entry_date = ?3, ciphertext = ?4, nonce = ?5, updated_at = ?6
                     WHERE id = ?1 AND owner_id = ?2",
                    params![
                        diary_id,
                        owner_id.to_string(),
                        date(write.entry_date),
                        write.ciphertext,
                        write.nonce,
                        ts(Utc::now()),
                    ],
                )
                .map_err(conflict_on("entry_date"))?;
            if n == 0 {
                return Ok(None);
            }
            for table in ["diary_memories", "diary_photos", "diary_locations"] {
                tx.execute(&format!("DELETE FROM {table} WHERE diary_id = ?1"), [&diary_id])?;
            }
            write_links(&tx, &diary_id, write)?;
            tx.commit()?;

            query_diary(conn, "id = ?1", &[&diary_id])
        })
    }

    pub fn delete_diary(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM diaries WHERE id = ?1 AND owner_id = ?2",
                params![id.to_string(), owner_id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    pub fn owned_diary_ids(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| owned_ids(conn, "diaries", owner_id, ids))
    }
}

fn write_links(tx: &Transaction<'_>, diary_id: &str, write: &DiaryWrite) -> Result<()> {
    for memory_id in &write.memory_ids {
        tx.execute(
            "INSERT OR IGNORE INTO diary_memories (diary_id, memory_id) VALUES (?1, ?2)",
            params![diary_id, memory_id.to_string()],
        )?;
    }
    for (position, path) in write.photos.iter().enumerate() {
        tx.execute(
            "INSERT INTO diary_photos (diary_id, position, path) VALUES (?1, ?2, ?3)",
            params![diary_id, position as i64, path],
        )?;
    }
    for name in &write.locations {
        let location = get_or_create_location(tx, name)?;
        tx.execute(
            "INSERT OR IGNORE INTO diary_locations (diary_id, location_id) VALUES (?1, ?2)",
            params![diary_id, location.id.to_string()],
        )?;
    }
    Ok(())
}

struct RawDiary {
    id: String,
    owner_id: String,
    entry_date: String,
    ciphertext: Vec<u8>,
    nonce: Vec<u8>,
    created_at: String,
    updated_at: String,
}

fn read_diary(row: &Row<'_>) -> rusqlite::Result<RawDiary> {
    Ok(RawDiary {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        entry_date: row.get(2)?,
        ciphertext: row.get(3)?,
        nonce: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl RawDiary {
    fn into_row(self, conn: &Connection) -> Result<DiaryRow> {
        let memory_ids = {
            let mut stmt = conn.prepare(
                "SELECT memory_id FROM diary_memories WHERE diary_id = ?1 ORDER BY memory_id",
            )?;
            let raw = stmt
                .query_map([&self.id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            raw.iter().map(|id| parse_id(id)).collect::<Result<Vec<_>>>()?
        };

        let photos = {
            let mut stmt = conn
                .prepare("SELECT path FROM diary_photos WHERE diary_id = ?1 ORDER BY position")?;
            let photos = stmt
                .query_map([&self.id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            photos
        };

        let locations = {
            let mut stmt = conn.prepare(
                "SELECT l.id, l.name, l.city, l.country, l.latitude, l.longitude
                 FROM diary_locations dl
                 JOIN locations l ON l.id = dl.location_id
                 WHERE dl.diary_id = ?1
                 ORDER BY l.name COLLATE NOCASE",
            )?;
            let raw = stmt
                .query_map([&self.id], read_location)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            raw.into_iter()
                .map(RawLocation::into_location)
                .collect::<Result<Vec<Location>>>()?
        };

        Ok(DiaryRow {
            id: parse_id(&self.id)?,
            owner_id: parse_id(&self.owner_id)?,
            entry_date: parse_date(&self.entry_date)?,
            ciphertext: self.ciphertext,
            nonce: self.nonce,
            memory_ids,
            photos,
            locations,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

fn query_diary(conn: &Connection, filter: &str, values: &[&String]) -> Result<Option<DiaryRow>> {
    let sql = format!("SELECT {DIARY_COLUMNS} FROM diaries WHERE {filter}");
    let raw = conn
        .query_row(&sql, rusqlite::params_from_iter(values.iter()), read_diary)
        .optional()?;
    raw.map(|r| r.into_row(conn)).transpose()
}
