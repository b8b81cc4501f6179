use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    next_ts, require_non_empty, Retention, RoomStore, StoreError, StoreResult, CREATE_ATTEMPTS,
};
use crate::model::{
    now_ms, Message, MessagePage, NewMessage, RoomId, RoomSnapshot, RoomSummary,
    SUMMARY_PARTICIPANTS,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        id TEXT PRIMARY KEY NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS rooms_updated_at ON rooms (updated_at DESC)",
    "CREATE TABLE IF NOT EXISTS participants (
        room_id TEXT NOT NULL,
        name TEXT NOT NULL,
        PRIMARY KEY (room_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        room_id TEXT NOT NULL,
        author TEXT NOT NULL,
        text TEXT NOT NULL,
        ts INTEGER NOT NULL,
        client_id TEXT
    )",
    "CREATE INDEX IF NOT EXISTS messages_room_ts ON messages (room_id, ts)",
    "CREATE INDEX IF NOT EXISTS messages_room_client ON messages (room_id, client_id)",
];

type MessageRow = (String, String, i64, Option<String>);

fn message_from_row((author, text, ts, client_id): MessageRow) -> Message {
    Message {
        author,
        text,
        ts,
        client_id: client_id.and_then(|id| Uuid::parse_str(&id).ok()),
    }
}

pub struct SqliteRoomStore {
    pool: SqlitePool,
    retention: Retention,
}

impl SqliteRoomStore {
    /// Open (creating if needed) the database at `url` and make sure the schema exists.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // every connection to an in-memory database would see its own empty database
        let max_connections = if url.contains(":memory:") { 1 } else { 16 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let store = Self::from_pool(pool).await?;
        info!(url, "Opened sqlite room store");
        Ok(store)
    }

    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&pool).await?;
        }
        Ok(Self {
            pool,
            retention: Retention::default(),
        })
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    /// Bump `updated_at` as the first write of a transaction so SQLite takes
    /// the write lock before anything is read.
    async fn touch(tx: &mut Transaction<'_, Sqlite>, room: &RoomId, now: i64) -> StoreResult<()> {
        let touched = sqlx::query("UPDATE rooms SET updated_at = MAX(updated_at, ?) WHERE id = ?")
            .bind(now)
            .bind(room.as_str())
            .execute(&mut **tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(StoreError::RoomNotFound(room.clone()));
        }
        Ok(())
    }

    async fn insert_participant(
        tx: &mut Transaction<'_, Sqlite>,
        room: &RoomId,
        name: &str,
    ) -> StoreResult<()> {
        sqlx::query("INSERT OR IGNORE INTO participants (room_id, name) VALUES (?, ?)")
            .bind(room.as_str())
            .bind(name)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn snapshot_in(conn: &mut SqliteConnection, room: &RoomId) -> StoreResult<RoomSnapshot> {
        let Some((created_at, updated_at)): Option<(i64, i64)> =
            sqlx::query_as("SELECT created_at, updated_at FROM rooms WHERE id = ?")
                .bind(room.as_str())
                .fetch_optional(&mut *conn)
                .await?
        else {
            return Err(StoreError::RoomNotFound(room.clone()));
        };

        let participants: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM participants WHERE room_id = ? ORDER BY rowid")
                .bind(room.as_str())
                .fetch_all(&mut *conn)
                .await?;

        Ok(RoomSnapshot {
            id: room.clone(),
            created_at,
            updated_at,
            participants: participants.into_iter().map(|(name,)| name).collect(),
        })
    }

    async fn ensure_room(&self, room: &RoomId) -> StoreResult<()> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM rooms WHERE id = ?")
            .bind(room.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(StoreError::RoomNotFound(room.clone())),
        }
    }
}

#[async_trait]
impl RoomStore for SqliteRoomStore {
    async fn create_room(&self) -> StoreResult<RoomSnapshot> {
        for _ in 0..CREATE_ATTEMPTS {
            let id = RoomId::generate();
            let now = now_ms();
            let inserted = sqlx::query(
                "INSERT OR IGNORE INTO rooms (id, created_at, updated_at) VALUES (?, ?, ?)",
            )
            .bind(id.as_str())
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
            if inserted.rows_affected() == 1 {
                return Ok(RoomSnapshot {
                    id,
                    created_at: now,
                    updated_at: now,
                    participants: Vec::new(),
                });
            }
            debug!(room_id = %id, "Room id collision, retrying");
        }
        Err(StoreError::IdSpaceExhausted)
    }

    async fn add_participant(&self, room: &RoomId, name: &str) -> StoreResult<RoomSnapshot> {
        require_non_empty("name", name)?;
        let mut tx = self.pool.begin().await?;
        Self::touch(&mut tx, room, now_ms()).await?;
        Self::insert_participant(&mut tx, room, name).await?;
        let snapshot = Self::snapshot_in(&mut *tx, room).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    async fn append_message(&self, room: &RoomId, message: NewMessage) -> StoreResult<Message> {
        require_non_empty("author", &message.author)?;
        require_non_empty("text", &message.text)?;

        let now = now_ms();
        let mut tx = self.pool.begin().await?;
        Self::touch(&mut tx, room, now).await?;

        if let Some(client_id) = message.client_id {
            let existing: Option<MessageRow> = sqlx::query_as(
                "SELECT author, text, ts, client_id FROM messages
                 WHERE room_id = ? AND client_id = ?",
            )
            .bind(room.as_str())
            .bind(client_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(row) = existing {
                tx.commit().await?;
                debug!(room_id = %room, %client_id, "Duplicate client id, returning stored one");
                return Ok(message_from_row(row));
            }
        }

        let (last_ts,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(ts) FROM messages WHERE room_id = ?")
                .bind(room.as_str())
                .fetch_one(&mut *tx)
                .await?;
        let ts = next_ts(now, last_ts);

        sqlx::query(
            "INSERT INTO messages (room_id, author, text, ts, client_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(room.as_str())
        .bind(&message.author)
        .bind(&message.text)
        .bind(ts)
        .bind(message.client_id.as_ref().map(Uuid::to_string))
        .execute(&mut *tx)
        .await?;
        Self::insert_participant(&mut tx, room, &message.author).await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE room_id = ?")
            .bind(room.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let excess = self.retention.excess(count as usize);
        if excess > 0 {
            sqlx::query(
                "DELETE FROM messages WHERE seq IN (
                    SELECT seq FROM messages WHERE room_id = ? ORDER BY ts, seq LIMIT ?
                )",
            )
            .bind(room.as_str())
            .bind(excess as i64)
            .execute(&mut *tx)
            .await?;
            debug!(room_id = %room, purged = excess, "Trimmed room history");
        }

        tx.commit().await?;
        Ok(Message {
            author: message.author,
            text: message.text,
            ts,
            client_id: message.client_id,
        })
    }

    async fn messages_since(
        &self,
        room: &RoomId,
        since_ts: i64,
        limit: usize,
    ) -> StoreResult<MessagePage> {
        self.ensure_room(room).await?;
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT author, text, ts, client_id FROM messages
             WHERE room_id = ? AND ts > ?
             ORDER BY ts, seq
             LIMIT ?",
        )
        .bind(room.as_str())
        .bind(since_ts)
        .bind(limit as i64 + 1)
        .fetch_all(&self.pool)
        .await?;

        let has_more = rows.len() > limit;
        let messages = rows.into_iter().take(limit).map(message_from_row).collect();
        Ok(MessagePage { messages, has_more })
    }

    async fn recent_messages(&self, room: &RoomId, limit: usize) -> StoreResult<Vec<Message>> {
        self.ensure_room(room).await?;
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT author, text, ts, client_id FROM messages
             WHERE room_id = ?
             ORDER BY ts DESC, seq DESC
             LIMIT ?",
        )
        .bind(room.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages: Vec<Message> = rows.into_iter().map(message_from_row).collect();
        messages.reverse();
        Ok(messages)
    }

    async fn snapshot(&self, room: &RoomId) -> StoreResult<RoomSnapshot> {
        let mut conn = self.pool.acquire().await?;
        Self::snapshot_in(&mut conn, room).await
    }

    async fn list_rooms(
        &self,
        limit: usize,
        since_updated_at: Option<i64>,
    ) -> StoreResult<Vec<RoomSummary>> {
        let rooms: Vec<(String, i64, i64, i64)> = sqlx::query_as(
            "SELECT r.id, r.created_at, r.updated_at,
                    (SELECT COUNT(*) FROM participants p WHERE p.room_id = r.id)
             FROM rooms r
             WHERE r.updated_at > ?
             ORDER BY r.updated_at DESC, r.id
             LIMIT ?",
        )
        .bind(since_updated_at.unwrap_or(i64::MIN))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(rooms.len());
        for (id, created_at, updated_at, participant_count) in rooms {
            let participants: Vec<(String,)> = sqlx::query_as(
                "SELECT name FROM participants WHERE room_id = ? ORDER BY rowid LIMIT ?",
            )
            .bind(&id)
            .bind(SUMMARY_PARTICIPANTS as i64)
            .fetch_all(&self.pool)
            .await?;
            summaries.push(RoomSummary {
                id: RoomId::new(id),
                created_at,
                updated_at,
                participant_count: participant_count as usize,
                participants: participants.into_iter().map(|(name,)| name).collect(),
            });
        }
        Ok(summaries)
    }

    async fn sweep_idle(&self, updated_before: i64) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM messages WHERE room_id IN (SELECT id FROM rooms WHERE updated_at < ?)",
        )
            .bind(updated_before)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM participants WHERE room_id IN (SELECT id FROM rooms WHERE updated_at < ?)",
        )
            .bind(updated_before)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM rooms WHERE updated_at < ?")
            .bind(updated_before)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(removed.rows_affected() as usize)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
