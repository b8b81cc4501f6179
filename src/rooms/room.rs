use axum::{
    debug_handler,
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};

use crate::{
    model::RoomId,
    protocol::{positive_or_zero, RoomState, RoomStateQuery},
    AppResult, RoomService,
};

use super::query;

/// Polling endpoint: participants plus messages newer than `sinceTs`.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_state(
    State(service): State<RoomService>,
    Path(room_id): Path<RoomId>,
    params: Result<Query<RoomStateQuery>, QueryRejection>,
) -> AppResult<Json<RoomState>> {
    let RoomStateQuery { since_ts } = query(params)?;
    let since_ts = positive_or_zero(since_ts.as_deref());
    Ok(Json(service.room_state(&room_id, since_ts).await?))
}
