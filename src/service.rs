use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::{Message, NewMessage, RoomId};
use crate::protocol::{CreatedRoom, JoinedRoom, RoomListing, RoomState};
use crate::store::{RoomStore, StoreError, RETENTION_HIGH};
use crate::suggest::{parse_variants, SuggestError, SuggestionSource};

/// History returned to a joining client: all a room can retain, so a late
/// joiner sees the same transcript as everyone already in the room.
pub const HISTORY_LIMIT: usize = RETENTION_HIGH;
/// Messages per poll response.
pub const PAGE_SIZE: usize = 50;
pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("room not found")]
    RoomNotFound(RoomId),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Suggest(#[from] SuggestError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RoomNotFound(id) => Self::RoomNotFound(id),
            StoreError::EmptyField(field) => Self::Validation(format!("{field} required")),
            other => Self::Store(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Request-level room operations with input validation.
#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn RoomStore>,
    suggester: Arc<dyn SuggestionSource>,
}

fn required(value: Option<&str>, message: &str) -> ServiceResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => Err(ServiceError::Validation(message.to_owned())),
    }
}

impl RoomService {
    pub fn new(store: Arc<dyn RoomStore>, suggester: Arc<dyn SuggestionSource>) -> Self {
        Self { store, suggester }
    }

    pub fn store(&self) -> &Arc<dyn RoomStore> {
        &self.store
    }

    pub async fn create_room(&self) -> ServiceResult<CreatedRoom> {
        let room = self.store.create_room().await?;
        info!(room_id = %room.id, "Room created");
        Ok(CreatedRoom {
            join_path: room.id.join_path(),
            room_id: room.id,
        })
    }

    /// Add `name` to the room and hand back the full bounded history.
    pub async fn join_room(&self, room: &RoomId, name: Option<&str>) -> ServiceResult<JoinedRoom> {
        let name = required(name, "name required")?;
        let snapshot = self.store.add_participant(room, &name).await?;
        let messages = self.store.recent_messages(room, HISTORY_LIMIT).await?;
        info!(room_id = %room, name = %name, history = messages.len(), "Participant joined");
        Ok(JoinedRoom {
            room_id: snapshot.id,
            participants: snapshot.participants,
            messages,
        })
    }

    pub async fn post_message(
        &self,
        room: &RoomId,
        author: Option<&str>,
        text: Option<&str>,
        client_id: Option<Uuid>,
    ) -> ServiceResult<Message> {
        let message = match (required(author, ""), required(text, "")) {
            (Ok(author), Ok(text)) => NewMessage { author, text, client_id },
            _ => return Err(ServiceError::Validation("author/name and text required".into())),
        };
        let stored = self.store.append_message(room, message).await?;
        debug!(room_id = %room, ts = stored.ts, "Message posted");
        Ok(stored)
    }

    /// Participants plus one page of messages newer than `since_ts`.
    pub async fn room_state(&self, room: &RoomId, since_ts: i64) -> ServiceResult<RoomState> {
        let snapshot = self.store.snapshot(room).await?;
        let page = self.store.messages_since(room, since_ts.max(0), PAGE_SIZE).await?;
        let count = page.messages.len();
        debug!(room_id = %room, since_ts, count, has_more = page.has_more, "Room polled");
        Ok(RoomState {
            room_id: snapshot.id,
            participants: snapshot.participants,
            messages: page.messages,
            has_more: page.has_more,
        })
    }

    pub async fn suggest_replies(
        &self,
        room: &RoomId,
        text: Option<&str>,
    ) -> ServiceResult<Vec<String>> {
        let text = required(text, "text required")?;
        self.store.snapshot(room).await?;
        let reply = self.suggester.suggest(&text).await.inspect_err(|e| {
            warn!(room_id = %room, error = %e, "Suggestion source failed");
        })?;
        Ok(parse_variants(&reply))
    }

    /// `limit` of 0 means the default; anything above the cap is clamped.
    pub async fn list_rooms(
        &self,
        limit: usize,
        since_updated_at: i64,
    ) -> ServiceResult<Vec<RoomListing>> {
        let limit = match limit {
            0 => DEFAULT_LIST_LIMIT,
            n => n.min(MAX_LIST_LIMIT),
        };
        let since = (since_updated_at > 0).then_some(since_updated_at);
        let rooms = self.store.list_rooms(limit, since).await?;
        Ok(rooms.into_iter().map(RoomListing::from).collect())
    }

    /// Drop rooms idle since before `updated_before`.
    pub async fn sweep_idle(&self, updated_before: i64) -> ServiceResult<usize> {
        let removed = self.store.sweep_idle(updated_before).await?;
        if removed > 0 {
            info!(removed, "Swept idle rooms");
        }
        Ok(removed)
    }
}
