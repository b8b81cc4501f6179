use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    model::RoomId,
    protocol::{SuggestRequest, Suggestions},
    AppResult, RoomService,
};

use super::json_body;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn suggest_replies(
    State(service): State<RoomService>,
    Path(room_id): Path<RoomId>,
    body: Result<Json<SuggestRequest>, JsonRejection>,
) -> AppResult<Json<Suggestions>> {
    let SuggestRequest { text } = json_body(body)?;
    let variants = service.suggest_replies(&room_id, text.as_deref()).await?;
    Ok(Json(Suggestions { variants }))
}
