pub mod appresult;
pub mod client;
pub mod config;
pub mod merge;
pub mod model;
pub mod protocol;
pub mod rooms;
pub mod service;
pub mod store;
pub mod suggest;

use axum::{debug_handler, extract::{FromRef, State}, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
pub use service::RoomService;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub service: RoomService,
}

/// The whole HTTP surface: `/pvp/...` plus a health check.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .nest("/pvp", rooms::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[debug_handler(state = AppState)]
async fn health(State(service): State<RoomService>) -> Json<Value> {
    match service.store().ping().await {
        Ok(()) => Json(json!({ "status": "ok", "db": "ok" })),
        Err(e) => Json(json!({ "status": "ok", "db": "down", "error": e.to_string() })),
    }
}
