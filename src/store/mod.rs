//! Room and message persistence.
//!
//! [`RoomStore`] is the only path through which rooms, participants and
//! messages are mutated. Implementations must serialize mutations of a single
//! room so that appends and participant updates never interleave.

mod memory;
mod sqlite;

pub use memory::MemoryRoomStore;
pub use sqlite::SqliteRoomStore;

use async_trait::async_trait;

use crate::model::{Message, MessagePage, NewMessage, RoomId, RoomSnapshot, RoomSummary};

/// How many fresh ids to try before giving up on room creation.
const CREATE_ATTEMPTS: usize = 16;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("could not allocate a free room id")]
    IdSpaceExhausted,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Most messages a room can hold with the default [`Retention`].
pub const RETENTION_HIGH: usize = 220;
pub const RETENTION_LOW: usize = 200;

/// Bounded history per room. Once a room holds more than `high` messages the
/// oldest are purged until `low` remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    pub high: usize,
    pub low: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            high: RETENTION_HIGH,
            low: RETENTION_LOW,
        }
    }
}

impl Retention {
    /// Number of oldest messages to drop from a room holding `count`.
    pub fn excess(&self, count: usize) -> usize {
        if count > self.high {
            count - self.low
        } else {
            0
        }
    }
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Allocate a fresh room with no participants and no messages.
    async fn create_room(&self) -> StoreResult<RoomSnapshot>;

    /// Idempotently add `name` to the room's participants.
    async fn add_participant(&self, room: &RoomId, name: &str) -> StoreResult<RoomSnapshot>;

    /// Append a message stamped with a per-room strictly increasing `ts`.
    ///
    /// The author joins the participant set. A message whose `client_id` is
    /// already stored in the room is returned as-is instead of appended.
    async fn append_message(&self, room: &RoomId, message: NewMessage) -> StoreResult<Message>;

    /// Messages with `ts > since_ts`, ascending, at most `limit`.
    async fn messages_since(
        &self,
        room: &RoomId,
        since_ts: i64,
        limit: usize,
    ) -> StoreResult<MessagePage>;

    /// The newest `limit` messages, ascending.
    async fn recent_messages(&self, room: &RoomId, limit: usize) -> StoreResult<Vec<Message>>;

    async fn snapshot(&self, room: &RoomId) -> StoreResult<RoomSnapshot>;

    /// Rooms by `updated_at` descending, optionally only those updated after `since_updated_at`.
    async fn list_rooms(
        &self,
        limit: usize,
        since_updated_at: Option<i64>,
    ) -> StoreResult<Vec<RoomSummary>>;

    /// Delete rooms last updated before `updated_before`. Returns how many went away.
    async fn sweep_idle(&self, updated_before: i64) -> StoreResult<usize>;

    async fn ping(&self) -> StoreResult<()>;
}

pub(crate) fn require_non_empty(field: &'static str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::EmptyField(field));
    }
    Ok(())
}

/// The `ts` for the next message in a room whose newest message is `last_ts`.
pub(crate) fn next_ts(now: i64, last_ts: Option<i64>) -> i64 {
    match last_ts {
        Some(last) if last >= now => last + 1,
        _ => now,
    }
}
