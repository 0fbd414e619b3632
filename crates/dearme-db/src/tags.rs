//! Case-insensitive get-or-create for tags and locations.
//!
//! Both tables are unique on `name_key`, the Unicode-lowercased name, so
//! lookups fold case the same way input splitting does. Inserts ignore
//! conflicts and then re-select, so two requests creating the same name at
//! once end up sharing one row.

use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use dearme_types::models::{Location, Tag};
use dearme_types::normalize::{name_key, slugify};

use crate::{Database, DbError, Result, parse_id};

impl Database {
    pub fn get_or_create_tags(&self, names: &[String]) -> Result<Vec<Tag>> {
        self.with_conn(|conn| names.iter().map(|n| get_or_create_tag(conn, n)).collect())
    }

    pub fn get_or_create_locations(&self, names: &[String]) -> Result<Vec<Location>> {
        self.with_conn(|conn| {
            names
                .iter()
                .map(|n| get_or_create_location(conn, n))
                .collect()
        })
    }
}

pub(crate) fn get_or_create_tag(conn: &Connection, name: &str) -> Result<Tag> {
    let name = name.trim();
    if let Some(tag) = find_tag(conn, name)? {
        return Ok(tag);
    }

    conn.execute(
        "INSERT INTO tags (id, name, name_key, slug) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name_key) DO NOTHING",
        params![Uuid::new_v4().to_string(), name, name_key(name), slugify(name)],
    )?;

    find_tag(conn, name)?.ok_or(DbError::NotFound)
}

pub(crate) fn get_or_create_location(conn: &Connection, name: &str) -> Result<Location> {
    let name = name.trim();
    if let Some(location) = find_location(conn, name)? {
        return Ok(location);
    }

    conn.execute(
        "INSERT INTO locations (id, name, name_key) VALUES (?1, ?2, ?3)
         ON CONFLICT(name_key) DO NOTHING",
        params![Uuid::new_v4().to_string(), name, name_key(name)],
    )?;

    find_location(conn, name)?.ok_or(DbError::NotFound)
}

fn find_tag(conn: &Connection, name: &str) -> Result<Option<Tag>> {
    let raw = conn
        .query_row(
            "SELECT id, name, slug FROM tags WHERE name_key = ?1",
            [name_key(name)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    raw.map(|(id, name, slug)| {
        Ok(Tag {
            id: parse_id(&id)?,
            name,
            slug,
        })
    })
    .transpose()
}

fn find_location(conn: &Connection, name: &str) -> Result<Option<Location>> {
    let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE name_key = ?1");
    let raw = conn.query_row(&sql, [name_key(name)], read_location).optional()?;
    raw.map(RawLocation::into_location).transpose()
}

pub(crate) const LOCATION_COLUMNS: &str = "id, name, city, country, latitude, longitude";

pub(crate) struct RawLocation {
    id: String,
    name: String,
    city: Option<String>,
    country: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl RawLocation {
    pub(crate) fn into_location(self) -> Result<Location> {
        Ok(Location {
            id: parse_id(&self.id)?,
            name: self.name,
            city: self.city,
            country: self.country,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Reads [`LOCATION_COLUMNS`] starting at column 0.
pub(crate) fn read_location(row: &Row<'_>) -> rusqlite::Result<RawLocation> {
    Ok(RawLocation {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        country: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
    })
}

/// Tags attached to a memory, alphabetical.
pub(crate) fn tags_for_memory(conn: &Connection, memory_id: &str) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.slug
         FROM memory_tags mt
         JOIN tags t ON t.id = mt.tag_id
         WHERE mt.memory_id = ?1
         ORDER BY t.name COLLATE NOCASE",
    )?;
    let raw = stmt
        .query_map([memory_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, name, slug)| {
            Ok(Tag {
                id: parse_id(&id)?,
                name,
                slug,
            })
        })
        .collect()
}
