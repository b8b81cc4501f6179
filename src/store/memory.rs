use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use super::{
    next_ts, require_non_empty, Retention, RoomStore, StoreError, StoreResult, CREATE_ATTEMPTS,
};
use crate::model::{
    now_ms, Message, MessagePage, NewMessage, RoomId, RoomSnapshot, RoomSummary,
};

struct RoomRecord {
    id: RoomId,
    created_at: i64,
    updated_at: i64,
    participants: Vec<String>,
    messages: VecDeque<Message>,
    last_ts: Option<i64>,
    /// Set by the sweeper. Callers that grabbed the record before it was
    /// unlinked must treat it as gone.
    removed: bool,
}

impl RoomRecord {
    fn touch(&mut self, now: i64) {
        self.updated_at = self.updated_at.max(now);
    }

    fn add_participant(&mut self, name: &str) {
        if !self.participants.iter().any(|p| p == name) {
            self.participants.push(name.to_owned());
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            participants: self.participants.clone(),
        }
    }
}

/// Process-local store. Each room sits behind its own mutex; the outer map
/// lock is only held to look rooms up, insert or sweep them.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<RoomRecord>>>>,
    retention: Retention,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Retention) -> Self {
        Self {
            rooms: RwLock::default(),
            retention,
        }
    }

    async fn room(&self, id: &RoomId) -> StoreResult<Arc<Mutex<RoomRecord>>> {
        self.rooms
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::RoomNotFound(id.clone()))
    }

    async fn lock_live(
        record: Arc<Mutex<RoomRecord>>,
        id: &RoomId,
    ) -> StoreResult<OwnedMutexGuard<RoomRecord>> {
        let record = record.lock_owned().await;
        if record.removed {
            return Err(StoreError::RoomNotFound(id.clone()));
        }
        Ok(record)
    }

    async fn lock_room(&self, id: &RoomId) -> StoreResult<OwnedMutexGuard<RoomRecord>> {
        Self::lock_live(self.room(id).await?, id).await
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create_room(&self) -> StoreResult<RoomSnapshot> {
        let mut rooms = self.rooms.write().await;
        for _ in 0..CREATE_ATTEMPTS {
            let id = RoomId::generate();
            if rooms.contains_key(&id) {
                debug!(room_id = %id, "Room id collision, retrying");
                continue;
            }
            let now = now_ms();
            let record = RoomRecord {
                id: id.clone(),
                created_at: now,
                updated_at: now,
                participants: Vec::new(),
                messages: VecDeque::new(),
                last_ts: None,
                removed: false,
            };
            let snapshot = record.snapshot();
            rooms.insert(id, Arc::new(Mutex::new(record)));
            return Ok(snapshot);
        }
        Err(StoreError::IdSpaceExhausted)
    }

    async fn add_participant(&self, room: &RoomId, name: &str) -> StoreResult<RoomSnapshot> {
        require_non_empty("name", name)?;
        let mut record = self.lock_room(room).await?;
        record.add_participant(name);
        record.touch(now_ms());
        Ok(record.snapshot())
    }

    async fn append_message(&self, room: &RoomId, message: NewMessage) -> StoreResult<Message> {
        require_non_empty("author", &message.author)?;
        require_non_empty("text", &message.text)?;
        let mut record = self.lock_room(room).await?;

        if let Some(client_id) = message.client_id {
            let existing = record.messages.iter().find(|m| m.client_id == Some(client_id));
            if let Some(existing) = existing {
                debug!(room_id = %room, %client_id, "Duplicate client id, returning stored one");
                return Ok(existing.clone());
            }
        }

        let now = now_ms();
        let ts = next_ts(now, record.last_ts);
        let stored = Message {
            author: message.author,
            text: message.text,
            ts,
            client_id: message.client_id,
        };
        record.messages.push_back(stored.clone());
        record.last_ts = Some(ts);
        record.add_participant(&stored.author);
        record.touch(now);

        let excess = self.retention.excess(record.messages.len());
        if excess > 0 {
            record.messages.drain(..excess);
            debug!(room_id = %room, purged = excess, "Trimmed room history");
        }

        Ok(stored)
    }

    async fn messages_since(
        &self,
        room: &RoomId,
        since_ts: i64,
        limit: usize,
    ) -> StoreResult<MessagePage> {
        let record = self.lock_room(room).await?;
        let mut newer = record.messages.iter().filter(|m| m.ts > since_ts);
        let messages: Vec<Message> = newer.by_ref().take(limit).cloned().collect();
        let has_more = newer.next().is_some();
        Ok(MessagePage { messages, has_more })
    }

    async fn recent_messages(&self, room: &RoomId, limit: usize) -> StoreResult<Vec<Message>> {
        let record = self.lock_room(room).await?;
        let skip = record.messages.len().saturating_sub(limit);
        Ok(record.messages.iter().skip(skip).cloned().collect())
    }

    async fn snapshot(&self, room: &RoomId) -> StoreResult<RoomSnapshot> {
        Ok(self.lock_room(room).await?.snapshot())
    }

    async fn list_rooms(
        &self,
        limit: usize,
        since_updated_at: Option<i64>,
    ) -> StoreResult<Vec<RoomSummary>> {
        let records: Vec<_> = self.rooms.read().await.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(records.len());
        for record in records {
            let record = record.lock().await;
            if record.removed {
                continue;
            }
            let snapshot = record.snapshot();
            if since_updated_at.is_none_or(|since| snapshot.updated_at > since) {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by(|a, b| {
            b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id))
        });
        snapshots.truncate(limit);
        Ok(snapshots.into_iter().map(RoomSummary::from).collect())
    }

    async fn sweep_idle(&self, updated_before: i64) -> StoreResult<usize> {
        let mut rooms = self.rooms.write().await;
        let mut idle = Vec::new();
        for (id, record) in rooms.iter() {
            let mut record = record.lock().await;
            if record.updated_at < updated_before {
                record.removed = true;
                idle.push(id.clone());
            }
        }
        for id in &idle {
            rooms.remove(id);
        }
        Ok(idle.len())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
