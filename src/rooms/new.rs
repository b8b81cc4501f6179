use axum::{debug_handler, extract::State, Json};

use crate::{protocol::CreatedRoom, AppResult, RoomService};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn create_room(
    State(service): State<RoomService>,
) -> AppResult<Json<CreatedRoom>> {
    Ok(Json(service.create_room().await?))
}
