use crate::Database;
use crate::error::{StoreError, is_constraint_violation};
use crate::models::{MessageRow, NewMessage, RoomRow, RoomSummary, UserRow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

impl Database {
    // -- Rooms --

    pub fn create_room(
        &self,
        name: &str,
        password_hash: Option<&str>,
    ) -> Result<RoomRow, StoreError> {
        self.with_conn_mut(|conn| {
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO rooms (name, hidden, password_hash, created_at, updated_at)
                 VALUES (?1, 0, ?2, ?3, ?3)",
                params![name, password_hash, now],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::RoomAlreadyExists(name.to_string())
                } else {
                    e.into()
                }
            })?;

            Ok(RoomRow {
                name: name.to_string(),
                hidden: false,
                password_hash: password_hash.map(str::to_string),
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    pub fn get_room(&self, name: &str) -> Result<RoomRow, StoreError> {
        self.with_conn(|conn| {
            query_room(conn, name)?.ok_or_else(|| StoreError::RoomNotFound(name.to_string()))
        })
    }

    /// All rooms with message counts, hidden ones included. Visibility
    /// policy belongs to the request layer, not the store.
    pub fn list_rooms(&self) -> Result<Vec<RoomSummary>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.name, r.hidden, r.password_hash IS NOT NULL,
                        (SELECT COUNT(*) FROM messages m WHERE m.room = r.name)
                 FROM rooms r
                 ORDER BY r.name",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(RoomSummary {
                        name: row.get(0)?,
                        hidden: row.get(1)?,
                        has_password: row.get(2)?,
                        message_count: row.get(3)?,
                        last_message_content: None,
                        last_message_user: None,
                        last_message_timestamp: None,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Case-insensitive substring search. An empty query matches every room
    /// (instr() finds the empty needle at position 1). Unlike `list_rooms`
    /// this also pulls the latest message as a preview.
    pub fn search_rooms(&self, query: &str) -> Result<Vec<RoomSummary>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.name, r.hidden, r.password_hash IS NOT NULL,
                        (SELECT COUNT(*) FROM messages m WHERE m.room = r.name),
                        (SELECT m.content FROM messages m WHERE m.room = r.name
                         ORDER BY m.seq DESC LIMIT 1),
                        (SELECT m.author FROM messages m WHERE m.room = r.name
                         ORDER BY m.seq DESC LIMIT 1),
                        (SELECT m.timestamp FROM messages m WHERE m.room = r.name
                         ORDER BY m.seq DESC LIMIT 1)
                 FROM rooms r
                 WHERE instr(unicode_lower(r.name), unicode_lower(?1)) > 0
                 ORDER BY r.name",
            )?;

            let rows = stmt
                .query_map([query], |row| {
                    Ok(RoomSummary {
                        name: row.get(0)?,
                        hidden: row.get(1)?,
                        has_password: row.get(2)?,
                        message_count: row.get(3)?,
                        last_message_content: row.get(4)?,
                        last_message_user: row.get(5)?,
                        last_message_timestamp: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn set_room_hidden(&self, name: &str, hidden: bool) -> Result<(), StoreError> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE rooms SET hidden = ?2, updated_at = ?3 WHERE name = ?1",
                params![name, hidden, now_rfc3339()],
            )?;
            if changed == 0 {
                return Err(StoreError::RoomNotFound(name.to_string()));
            }
            Ok(())
        })
    }

    // -- Messages --

    /// Persist a message, stamping the arrival timestamp. Runs in one
    /// transaction that also auto-creates the room and lazily registers the
    /// author's pubkey as an unverified user, so a message never lands
    /// without its room and user rows.
    pub fn save_message(&self, new: NewMessage<'_>) -> Result<MessageRow, StoreError> {
        self.with_conn_mut(|conn| {
            let now = now_rfc3339();
            let tx = conn.unchecked_transaction()?;

            tx.execute(
                "INSERT OR IGNORE INTO rooms (name, hidden, password_hash, created_at, updated_at)
                 VALUES (?1, 0, NULL, ?2, ?2)",
                params![new.room, now],
            )?;
            if let Some(pubkey) = new.pubkey {
                insert_user_if_absent(&tx, pubkey, &now)?;
            }
            tx.execute(
                "INSERT INTO messages
                     (id, room, author, content, timestamp, signature, pubkey, signed_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.id,
                    new.room,
                    new.author,
                    new.content,
                    now,
                    new.signature,
                    new.pubkey,
                    new.signed_timestamp
                ],
            )?;

            tx.commit()?;

            Ok(MessageRow {
                id: new.id.to_string(),
                room: new.room.to_string(),
                author: new.author.to_string(),
                content: new.content.to_string(),
                timestamp: now,
                signature: new.signature.map(str::to_string),
                pubkey: new.pubkey.map(str::to_string),
                signed_timestamp: new.signed_timestamp,
            })
        })
    }

    /// Messages in arrival order (ascending `seq`). With a limit, returns
    /// the most recent `n`, still oldest-first.
    pub fn list_messages(
        &self,
        room: &str,
        limit: Option<u32>,
    ) -> Result<Vec<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = match limit {
                Some(_) => conn.prepare(
                    "SELECT id, room, author, content, timestamp, signature, pubkey, signed_timestamp
                     FROM (SELECT * FROM messages WHERE room = ?1 ORDER BY seq DESC LIMIT ?2)
                     ORDER BY seq ASC",
                )?,
                None => conn.prepare(
                    "SELECT id, room, author, content, timestamp, signature, pubkey, signed_timestamp
                     FROM messages
                     WHERE room = ?1
                     ORDER BY seq ASC",
                )?,
            };

            let map = |row: &rusqlite::Row<'_>| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    room: row.get(1)?,
                    author: row.get(2)?,
                    content: row.get(3)?,
                    timestamp: row.get(4)?,
                    signature: row.get(5)?,
                    pubkey: row.get(6)?,
                    signed_timestamp: row.get(7)?,
                })
            };

            let rows = match limit {
                Some(n) => stmt.query_map(params![room, n], map)?,
                None => stmt.query_map(params![room], map)?,
            }
            .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_posts_by_user(&self, public_key: &str) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE pubkey = ?1",
                [public_key],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Users --

    pub fn register_user(&self, public_key: &str) -> Result<UserRow, StoreError> {
        self.with_conn_mut(|conn| {
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO users (public_key, verified, created_at, updated_at)
                 VALUES (?1, 0, ?2, ?2)",
                params![public_key, now],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::UserAlreadyExists(public_key.to_string())
                } else {
                    e.into()
                }
            })?;

            Ok(UserRow {
                public_key: public_key.to_string(),
                verified: false,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    pub fn get_or_create_user(&self, public_key: &str) -> Result<UserRow, StoreError> {
        self.with_conn_mut(|conn| {
            let now = now_rfc3339();
            insert_user_if_absent(conn, public_key, &now)?;
            query_user(conn, public_key)?
                .ok_or_else(|| StoreError::UserNotFound(public_key.to_string()))
        })
    }

    pub fn get_user(&self, public_key: &str) -> Result<UserRow, StoreError> {
        self.with_conn(|conn| {
            query_user(conn, public_key)?
                .ok_or_else(|| StoreError::UserNotFound(public_key.to_string()))
        })
    }

    pub fn get_user_with_post_count(
        &self,
        public_key: &str,
    ) -> Result<(UserRow, i64), StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT u.public_key, u.verified, u.created_at, u.updated_at,
                        (SELECT COUNT(*) FROM messages m WHERE m.pubkey = u.public_key)
                 FROM users u
                 WHERE u.public_key = ?1",
                [public_key],
                |row| {
                    Ok((
                        UserRow {
                            public_key: row.get(0)?,
                            verified: row.get(1)?,
                            created_at: row.get(2)?,
                            updated_at: row.get(3)?,
                        },
                        row.get(4)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| StoreError::UserNotFound(public_key.to_string()))
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT public_key, verified, created_at, updated_at
                 FROM users
                 ORDER BY created_at, public_key",
            )?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(UserRow {
                        public_key: row.get(0)?,
                        verified: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn set_user_verified(
        &self,
        public_key: &str,
        verified: bool,
    ) -> Result<UserRow, StoreError> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET verified = ?2, updated_at = ?3 WHERE public_key = ?1",
                params![public_key, verified, now_rfc3339()],
            )?;
            if changed == 0 {
                return Err(StoreError::UserNotFound(public_key.to_string()));
            }
            query_user(conn, public_key)?
                .ok_or_else(|| StoreError::UserNotFound(public_key.to_string()))
        })
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn query_room(conn: &Connection, name: &str) -> Result<Option<RoomRow>, rusqlite::Error> {
    conn.query_row(
        "SELECT name, hidden, password_hash, created_at, updated_at FROM rooms WHERE name = ?1",
        [name],
        |row| {
            Ok(RoomRow {
                name: row.get(0)?,
                hidden: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )
    .optional()
}

fn query_user(conn: &Connection, public_key: &str) -> Result<Option<UserRow>, rusqlite::Error> {
    conn.query_row(
        "SELECT public_key, verified, created_at, updated_at FROM users WHERE public_key = ?1",
        [public_key],
        |row| {
            Ok(UserRow {
                public_key: row.get(0)?,
                verified: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        },
    )
    .optional()
}

fn insert_user_if_absent(
    conn: &Connection,
    public_key: &str,
    now: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO users (public_key, verified, created_at, updated_at)
         VALUES (?1, 0, ?2, ?2)",
        params![public_key, now],
    )?;
    Ok(())
}
