use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use super::{ClientError, ClientResult, RoomApi};
use crate::model::{Message, RoomId};
use crate::protocol::{
    CreatedRoom, ErrorBody, JoinedRoom, PostMessageRequest, PostedMessage, RoomList, RoomListing,
    RoomState, Suggestions,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

/// JSON-over-HTTP transport against a `/pvp` server.
#[derive(Clone)]
pub struct HttpRoomApi {
    http: reqwest::Client,
    base_url: String,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl HttpRoomApi {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/pvp{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_owned(),
        };
        Err(match status {
            StatusCode::BAD_REQUEST => ClientError::Validation(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            _ => ClientError::Server {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl RoomApi for HttpRoomApi {
    async fn create_room(&self) -> ClientResult<CreatedRoom> {
        Self::read(self.http.post(self.url("/create")).send().await?).await
    }

    async fn list_rooms(
        &self,
        limit: usize,
        since_updated_at: i64,
    ) -> ClientResult<Vec<RoomListing>> {
        let response = self
            .http
            .get(self.url("/rooms"))
            .query(&[("limit", limit as i64), ("sinceUpdatedAt", since_updated_at)])
            .send()
            .await?;
        let list: RoomList = Self::read(response).await?;
        Ok(list.rooms)
    }

    async fn join_room(&self, room: &RoomId, name: &str) -> ClientResult<JoinedRoom> {
        let response = self
            .http
            .post(self.url(&format!("/{room}/join")))
            .json(&json!({ "name": name }))
            .send()
            .await?;
        Self::read(response).await
    }

    async fn post_message(
        &self,
        room: &RoomId,
        author: &str,
        text: &str,
        client_id: Option<Uuid>,
    ) -> ClientResult<Message> {
        let body = PostMessageRequest {
            author: Some(author.to_owned()),
            text: Some(text.to_owned()),
            client_id,
        };
        let response = self
            .http
            .post(self.url(&format!("/{room}/message")))
            .json(&body)
            .send()
            .await?;
        let posted: PostedMessage = Self::read(response).await?;
        Ok(posted.message)
    }

    async fn room_state(&self, room: &RoomId, since_ts: i64) -> ClientResult<RoomState> {
        let response = self
            .http
            .get(self.url(&format!("/{room}")))
            .query(&[("sinceTs", since_ts)])
            .send()
            .await?;
        Self::read(response).await
    }

    async fn suggest_replies(&self, room: &RoomId, text: &str) -> ClientResult<Vec<String>> {
        let response = self
            .http
            .post(self.url(&format!("/{room}/suggest")))
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let suggestions: Suggestions = Self::read(response).await?;
        Ok(suggestions.variants)
    }
}
