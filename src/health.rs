use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::{app::AppState, db_mongo::queries};

#[derive(Serialize)]
pub struct MongoPingResponse {
    collections: Vec<String>,
}

pub async fn ping() -> &'static str {
    "ok"
}

pub async fn health_check() -> &'static str {
    "ok"
}

/// Lists the collections of the configured database to prove connectivity.
pub async fn mongo_ping(State(state): State<AppState>) -> impl IntoResponse {
    match queries::list_collection_names(&state.db).await {
        Ok(collections) => Json(MongoPingResponse { collections }).into_response(),
        Err(e) => {
            tracing::error!("Mongo ping failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "mongo unavailable").into_response()
        }
    }
}

pub async fn redis_ping(State(state): State<AppState>) -> impl IntoResponse {
    let Some(cache) = &state.cache else {
        return (StatusCode::SERVICE_UNAVAILABLE, "redis unavailable");
    };
    match cache.ping().await {
        Ok(()) => (StatusCode::OK, "pong"),
        Err(e) => {
            tracing::error!("Redis ping failed: {:#}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "redis unavailable")
        }
    }
}
