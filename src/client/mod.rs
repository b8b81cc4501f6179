//! Client side of room sync: transports and the polling engine.
//!
//! ```ignore
//! let api = HttpRoomApi::new("http://localhost:4000")?;
//! let engine = SyncEngine::new(api, EngineConfig::default());
//! let room = engine.create().await?;
//! engine.join(&room.room_id, "Alice").await?;
//! engine.post("Alice", "Bonjour").await?;
//! let mut events = engine.subscribe();
//! while let Ok(event) = events.recv().await { /* redraw from engine.snapshot().await */ }
//! ```

mod api;
mod engine;
mod http;
mod invite;

pub use api::RoomApi;
pub use engine::{EngineConfig, SessionPhase, SessionSnapshot, SyncEngine, SyncEvent};
pub use http::HttpRoomApi;
pub use invite::parse_room_id;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("room not found: {0}")]
    NotFound(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("unreadable response: {0}")]
    Decode(String),

    #[error("not in a room")]
    NoActiveRoom,
}

impl ClientError {
    /// Worth retrying on the next tick. Validation and not-found failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Transport(_) | Self::Server { .. } | Self::Decode(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_trouble_is_transient() {
        assert!(ClientError::Timeout.is_transient());
        assert!(ClientError::Transport("reset".into()).is_transient());
        assert!(ClientError::Server { status: 502, message: "bad gateway".into() }.is_transient());
        assert!(!ClientError::NotFound("abc".into()).is_transient());
        assert!(!ClientError::Validation("name required".into()).is_transient());
        assert!(!ClientError::NoActiveRoom.is_transient());
    }
}
