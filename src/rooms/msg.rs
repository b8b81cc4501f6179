use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    model::RoomId,
    protocol::{Acknowledged, PostMessageRequest, PostedMessage},
    AppResult, RoomService,
};

use super::json_body;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn post_message(
    State(service): State<RoomService>,
    Path(room_id): Path<RoomId>,
    body: Result<Json<PostMessageRequest>, JsonRejection>,
) -> AppResult<Json<Acknowledged<PostedMessage>>> {
    let PostMessageRequest { author, text, client_id } = json_body(body)?;
    let message = service
        .post_message(&room_id, author.as_deref(), text.as_deref(), client_id)
        .await?;
    Ok(Json(Acknowledged::new(PostedMessage { message })))
}
