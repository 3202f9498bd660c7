use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (rooms, users, messages)");
        conn.execute_batch(
            "
            CREATE TABLE rooms (
                name            TEXT PRIMARY KEY,
                hidden          INTEGER NOT NULL DEFAULT 0,
                password_hash   TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE TABLE users (
                public_key  TEXT PRIMARY KEY,
                verified    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE messages (
                seq              INTEGER PRIMARY KEY AUTOINCREMENT,
                id               TEXT NOT NULL UNIQUE,
                room             TEXT NOT NULL REFERENCES rooms(name),
                author           TEXT NOT NULL,
                content          TEXT NOT NULL,
                timestamp        TEXT NOT NULL,
                signature        TEXT,
                pubkey           TEXT REFERENCES users(public_key),
                signed_timestamp INTEGER
            );

            CREATE INDEX idx_messages_room ON messages(room, seq);
            CREATE INDEX idx_messages_pubkey ON messages(pubkey);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
