//! JSON bodies exchanged over `/pvp`.
//!
//! Response bodies that carry `ok: true` on the wire are wrapped in [`Acknowledged`]
//! by the handlers; clients read the inner struct directly and ignore it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Message, RoomId, RoomSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    pub room_id: RoomId,
    pub join_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub room_id: RoomId,
    pub created_at: i64,
    pub updated_at: i64,
    pub participant_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
    pub join_path: String,
}

impl From<RoomSummary> for RoomListing {
    fn from(summary: RoomSummary) -> Self {
        Self {
            join_path: summary.id.join_path(),
            room_id: summary.id,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            participant_count: summary.participant_count,
            participants: Some(summary.participants),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomList {
    pub rooms: Vec<RoomListing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedRoom {
    pub room_id: RoomId,
    pub participants: Vec<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub room_id: RoomId,
    pub participants: Vec<String>,
    pub messages: Vec<Message>,
    /// More messages newer than the last one returned are waiting.
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestions {
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default, alias = "author")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    #[serde(default, alias = "name")]
    pub author: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Query strings are kept as raw text so junk values degrade to defaults
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateQuery {
    #[serde(default, alias = "since", alias = "fromTs")]
    pub since_ts: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRoomsQuery {
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default, alias = "sinceUpdated", alias = "since")]
    pub since_updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Acknowledged<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Acknowledged<T> {
    pub fn new(body: T) -> Self {
        Self { ok: true, body }
    }
}

/// Lenient numeric parse: anything that is not a finite positive number is 0.
pub fn positive_or_zero(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n as i64)
        .unwrap_or(0)
}
