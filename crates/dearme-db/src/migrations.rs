use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // All of v1 or nothing, so a failed first start can be retried.
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                username            TEXT NOT NULL UNIQUE COLLATE NOCASE,
                email               TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password            TEXT NOT NULL,
                first_name          TEXT NOT NULL DEFAULT '',
                last_name           TEXT NOT NULL DEFAULT '',
                birthday            TEXT,
                timezone            TEXT NOT NULL DEFAULT 'UTC',
                is_active           INTEGER NOT NULL DEFAULT 0,
                is_email_verified   INTEGER NOT NULL DEFAULT 0,
                show_full_name      INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            -- Uniqueness is on name_key (the Unicode-lowercased name), not on name.
            CREATE TABLE tags (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                name_key    TEXT NOT NULL UNIQUE,
                slug        TEXT NOT NULL
            );

            CREATE TABLE locations (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                name_key    TEXT NOT NULL UNIQUE,
                city        TEXT,
                country     TEXT,
                latitude    REAL,
                longitude   REAL
            );

            CREATE TABLE memories (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                category        TEXT NOT NULL,
                is_private      INTEGER NOT NULL DEFAULT 1,
                take_to_grave   INTEGER NOT NULL DEFAULT 0,
                photo           TEXT,
                audio           TEXT,
                video           TEXT,
                memory_date     TEXT NOT NULL,
                location_id     TEXT REFERENCES locations(id) ON DELETE SET NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_memories_owner ON memories(owner_id, memory_date);

            CREATE TABLE memory_tags (
                memory_id   TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
                tag_id      TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (memory_id, tag_id)
            );

            -- Diary text is sealed with AES-256-GCM before it reaches this table.
            CREATE TABLE diaries (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                entry_date  TEXT NOT NULL,
                ciphertext  BLOB NOT NULL,
                nonce       BLOB NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE(owner_id, entry_date)
            );

            CREATE TABLE diary_memories (
                diary_id    TEXT NOT NULL REFERENCES diaries(id) ON DELETE CASCADE,
                memory_id   TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
                PRIMARY KEY (diary_id, memory_id)
            );

            CREATE TABLE diary_photos (
                diary_id    TEXT NOT NULL REFERENCES diaries(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL,
                path        TEXT NOT NULL,
                PRIMARY KEY (diary_id, position)
            );

            CREATE TABLE diary_locations (
                diary_id    TEXT NOT NULL REFERENCES diaries(id) ON DELETE CASCADE,
                location_id TEXT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
                PRIMARY KEY (diary_id, location_id)
            );

            CREATE TABLE letters (
                id                  TEXT PRIMARY KEY,
                sender_id           TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                external_emails     TEXT NOT NULL DEFAULT '',
                subject             TEXT NOT NULL,
                body                TEXT NOT NULL,
                attachment          TEXT,
                delivery_date       TEXT NOT NULL,
                status              TEXT NOT NULL DEFAULT 'draft'
                    CHECK (status IN ('draft', 'scheduled', 'locked', 'delivered')),
                locked_at           TEXT,
                grace_period_hours  INTEGER NOT NULL DEFAULT 48,
                delivery_attempts   INTEGER NOT NULL DEFAULT 0,
                last_delivery_error TEXT,
                delivered_at        TEXT,
                claimed_until       TEXT,
                claim_token         TEXT,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_letters_sender ON letters(sender_id, created_at);
            CREATE INDEX idx_letters_due ON letters(status, delivery_date);

            CREATE TABLE letter_receivers (
                letter_id   TEXT NOT NULL REFERENCES letters(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (letter_id, user_id)
            );

            CREATE TABLE letter_memories (
                letter_id   TEXT NOT NULL REFERENCES letters(id) ON DELETE CASCADE,
                memory_id   TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
                PRIMARY KEY (letter_id, memory_id)
            );

            CREATE TABLE letter_diaries (
                letter_id   TEXT NOT NULL REFERENCES letters(id) ON DELETE CASCADE,
                diary_id    TEXT NOT NULL REFERENCES diaries(id) ON DELETE CASCADE,
                PRIMARY KEY (letter_id, diary_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn failed_initial_schema_leaves_nothing_behind() {
        let conn = Connection::open_in_memory().unwrap();
        // A table v1 wants to create makes the batch fail part way.
        conn.execute_batch("CREATE TABLE letters (id TEXT)").unwrap();
        assert!(run(&conn).is_err());

        let users: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(users, 0);

        conn.execute_batch("DROP TABLE letters").unwrap();
        run(&conn).unwrap();
    }
}
