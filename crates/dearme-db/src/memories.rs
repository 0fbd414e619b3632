use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use dearme_types::api::MemoryDraft;
use dearme_types::models::Memory;

use crate::tags::{LOCATION_COLUMNS, get_or_create_location, get_or_create_tag, read_location, tags_for_memory};
use crate::time::{date, parse_date, parse_ts, ts};
use crate::{Database, DbError, Result, parse_id, placeholders};

const MEMORY_COLUMNS: &str = "id, owner_id, title, description, category, is_private, \
     take_to_grave, photo, audio, video, memory_date, location_id, created_at, updated_at";

impl Database {
    pub fn create_memory(&self, owner_id: Uuid, draft: &MemoryDraft) -> Result<Memory> {
        let id = Uuid::new_v4().to_string();
        let now = ts(Utc::now());

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let location_id = match &draft.location {
                Some(name) => Some(get_or_create_location(&tx, name)?.id.to_string()),
                None => None,
            };
            tx.execute(
                "INSERT INTO memories (id, owner_id, title, description, category, is_private,
                                       take_to_grave, photo, audio, video, memory_date,
                                       location_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
                params![
                    id,
                    owner_id.to_string(),
                    draft.title,
                    draft.description,
                    draft.category.as_str(),
                    draft.is_private,
                    draft.take_to_grave,
                    draft.photo,
                    draft.audio,
                    draft.video,
                    date(draft.memory_date),
                    location_id,
                    now,
                ],
            )?;
            attach_tags(&tx, &id, &draft.tags)?;
            tx.commit()?;

            query_memory(conn, "id = ?1", &[&id])?.ok_or(DbError::NotFound)
        })
    }

    pub fn get_memory(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Memory>> {
        self.with_conn(|conn| {
            query_memory(
                conn,
                "id = ?1 AND owner_id = ?2",
                &[&id.to_string(), &owner_id.to_string()],
            )
        })
    }

    /// The owner's memories, most recent memory date first.
    pub fn list_memories(&self, owner_id: Uuid) -> Result<Vec<Memory>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MEMORY_COLUMNS} FROM memories WHERE owner_id = ?1
                 ORDER BY memory_date DESC, created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let raw = stmt
                .query_map([owner_id.to_string()], read_memory)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            raw.into_iter().map(|r| r.into_memory(conn)).collect()
        })
    }

    pub fn update_memory(
        &self,
        owner_id: Uuid,
        id: Uuid,
        draft: &MemoryDraft,
    ) -> Result<Option<Memory>> {
        let memory_id = id.to_string();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let location_id = match &draft.location {
                Some(name) => Some(get_or_create_location(&tx, name)?.id.to_string()),
                None => None,
            };
            let n = tx.execute(
                "UPDATE memories
                 SET title = ?3, description = ?4, category = ?5, is_private = ?6,
                     take_to_grave = ?7, photo = ?8, audio = ?9, video = ?10,
                     memory_date = ?11, location_id = ?12, updated_at = ?13
                 WHERE id = ?1 AND owner_id = ?2",
                params![
                    memory_id,
                    owner_id.to_string(),
                    draft.title,
                    draft.description,
                    draft.category.as_str(),
                    draft.is_private,
                    draft.take_to_grave,
                    draft.photo,
                    draft.audio,
                    draft.video,
                    date(draft.memory_date),
                    location_id,
                    ts(Utc::now()),
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            tx.execute("DELETE FROM memory_tags WHERE memory_id = ?1", [&memory_id])?;
            attach_tags(&tx, &memory_id, &draft.tags)?;
            tx.commit()?;

            query_memory(conn, "id = ?1", &[&memory_id])
        })
    }

    pub fn delete_memory(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM memories WHERE id = ?1 AND owner_id = ?2",
                params![id.to_string(), owner_id.to_string()],
            )?;
            Ok(n > 0)
        })
    }

    /// The subset of `ids` that belong to `owner_id`.
    pub fn owned_memory_ids(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| owned_ids(conn, "memories", owner_id, ids))
    }
}

/// The subset of `ids` in `table` whose `owner_id` matches.
pub(crate) fn owned_ids(
    conn: &Connection,
    table: &str,
    owner_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Uuid>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT id FROM {table} WHERE owner_id = ?1 AND id IN ({})",
        placeholders(2, ids.len())
    );
    let mut values = vec![owner_id.to_string()];
    values.extend(ids.iter().map(|id| id.to_string()));

    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raw.iter().map(|id| parse_id(id)).collect()
}

fn attach_tags(conn: &Connection, memory_id: &str, names: &[String]) -> Result<()> {
    for name in names {
        let tag = get_or_create_tag(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO memory_tags (memory_id, tag_id) VALUES (?1, ?2)",
            params![memory_id, tag.id.to_string()],
        )?;
    }
    Ok(())
}

struct RawMemory {
    id: String,
    owner_id: String,
    title: String,
    description: String,
    category: String,
    is_private: bool,
    take_to_grave: bool,
    photo: Option<String>,
    audio: Option<String>,
    video: Option<String>,
    memory_date: String,
    location_id: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_memory(row: &Row<'_>) -> rusqlite::Result<RawMemory> {
    Ok(RawMemory {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        is_private: row.get(5)?,
        take_to_grave: row.get(6)?,
        photo: row.get(7)?,
        audio: row.get(8)?,
        video: row.get(9)?,
        memory_date: row.get(10)?,
        location_id: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

impl RawMemory {
    fn into_memory(self, conn: &Connection) -> Result<Memory> {
        let location = match &self.location_id {
            Some(location_id) => {
                let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1");
                conn.query_row(&sql, [location_id], read_location)
                    .optional()?
                    .map(|raw| raw.into_location())
                    .transpose()?
            }
            None => None,
        };

        Ok(Memory {
            tags: tags_for_memory(conn, &self.id)?,
            id: parse_id(&self.id)?,
            owner_id: parse_id(&self.owner_id)?,
            title: self.title,
            description: self.description,
            category: self.category.parse().map_err(DbError::corrupt)?,
            is_private: self.is_private,
            take_to_grave: self.take_to_grave,
            photo: self.photo,
            audio: self.audio,
            video: self.video,
            memory_date: parse_date(&self.memory_date)?,
            location,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

fn query_memory(conn: &Connection, filter: &str, values: &[&String]) -> Result<Option<Memory>> {
    let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE {filter}");
    let raw = conn
        .query_row(&sql, params_from_iter(values.iter()), read_memory)
        .optional()?;
    raw.map(|r| r.into_memory(conn)).transpose()
}
