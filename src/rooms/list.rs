use axum::{
    debug_handler,
    extract::{rejection::QueryRejection, Query, State},
    Json,
};

use crate::{
    protocol::{positive_or_zero, Acknowledged, ListRoomsQuery, RoomList},
    AppResult, RoomService,
};

use super::query;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_rooms(
    State(service): State<RoomService>,
    params: Result<Query<ListRoomsQuery>, QueryRejection>,
) -> AppResult<Json<Acknowledged<RoomList>>> {
    let ListRoomsQuery { limit, since_updated_at } = query(params)?;
    let limit = positive_or_zero(limit.as_deref()) as usize;
    let since_updated_at = positive_or_zero(since_updated_at.as_deref());
    let rooms = service.list_rooms(limit, since_updated_at).await?;
    Ok(Json(Acknowledged::new(RoomList { rooms })))
}
