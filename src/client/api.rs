use async_trait::async_trait;
use uuid::Uuid;

use super::{ClientError, ClientResult};
use crate::model::{Message, RoomId};
use crate::protocol::{CreatedRoom, JoinedRoom, RoomListing, RoomState};
use crate::service::{RoomService, ServiceError};

/// The room operations a client can call, whatever sits on the other side.
#[async_trait]
pub trait RoomApi: Send + Sync + 'static {
    async fn create_room(&self) -> ClientResult<CreatedRoom>;

    async fn list_rooms(
        &self,
        limit: usize,
        since_updated_at: i64,
    ) -> ClientResult<Vec<RoomListing>>;

    async fn join_room(&self, room: &RoomId, name: &str) -> ClientResult<JoinedRoom>;

    async fn post_message(
        &self,
        room: &RoomId,
        author: &str,
        text: &str,
        client_id: Option<Uuid>,
    ) -> ClientResult<Message>;

    async fn room_state(&self, room: &RoomId, since_ts: i64) -> ClientResult<RoomState>;

    async fn suggest_replies(&self, room: &RoomId, text: &str) -> ClientResult<Vec<String>>;
}

impl From<ServiceError> for ClientError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => Self::Validation(message),
            ServiceError::RoomNotFound(id) => Self::NotFound(id.to_string()),
            other => Self::Server {
                status: 500,
                message: other.to_string(),
            },
        }
    }
}

/// In-process transport, for hosts that embed the service next to the client.
#[async_trait]
impl RoomApi for RoomService {
    async fn create_room(&self) -> ClientResult<CreatedRoom> {
        Ok(RoomService::create_room(self).await?)
    }

    async fn list_rooms(
        &self,
        limit: usize,
        since_updated_at: i64,
    ) -> ClientResult<Vec<RoomListing>> {
        Ok(RoomService::list_rooms(self, limit, since_updated_at).await?)
    }

    async fn join_room(&self, room: &RoomId, name: &str) -> ClientResult<JoinedRoom> {
        Ok(RoomService::join_room(self, room, Some(name)).await?)
    }

    async fn post_message(
        &self,
        room: &RoomId,
        author: &str,
        text: &str,
        client_id: Option<Uuid>,
    ) -> ClientResult<Message> {
        Ok(RoomService::post_message(self, room, Some(author), Some(text), client_id).await?)
    }

    async fn room_state(&self, room: &RoomId, since_ts: i64) -> ClientResult<RoomState> {
        Ok(RoomService::room_state(self, room, since_ts).await?)
    }

    async fn suggest_replies(&self, room: &RoomId, text: &str) -> ClientResult<Vec<String>> {
        Ok(RoomService::suggest_replies(self, room, Some(text)).await?)
    }
}
