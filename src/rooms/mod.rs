mod join;
mod list;
mod msg;
mod new;
mod room;
mod suggest;

use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Query},
    routing::{get, post},
    Json, Router,
};

use crate::{AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(new::create_room))
        .route("/rooms", get(list::list_rooms))
        .route("/{id}", get(room::room_state))
        .route("/{id}/join", post(join::join_room))
        .route("/{id}/message", post(msg::post_message))
        .route("/{id}/suggest", post(suggest::suggest_replies))
}

/// Bad JSON is a validation failure like any other, reported as `{error}`.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(body)| body)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

pub(crate) fn query<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(query)| query)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}
