use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    model::RoomId,
    protocol::{Acknowledged, JoinRequest, JoinedRoom},
    AppResult, RoomService,
};

use super::json_body;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn join_room(
    State(service): State<RoomService>,
    Path(room_id): Path<RoomId>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> AppResult<Json<Acknowledged<JoinedRoom>>> {
    let JoinRequest { name } = json_body(body)?;
    let joined = service.join_room(&room_id, name.as_deref()).await?;
    Ok(Json(Acknowledged::new(joined)))
}
