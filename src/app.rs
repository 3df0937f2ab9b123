use std::time::Duration;

use axum::{
    Router,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use mongodb::{Client, Database};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{auth, db_redis::UserCache, health, users};

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub db: Database,
    /// Absent when Redis is not configured.
    pub cache: Option<UserCache>,
    pub use_transactions: bool,
}

/// Build the HTTP application. A zero `request_timeout_secs` disables the
/// timeout layer.
pub fn router(state: AppState, request_timeout_secs: u64) -> Router {
    let users = Router::new()
        .route("/bulk", post(users::bulk_create_users))
        .route(
            "/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/{id}/friends/{friend_id}", post(users::add_friend))
        .route_layer(middleware::from_fn(auth::require_caller));

    let app = Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health_check))
        .route("/mongo-ping", get(health::mongo_ping))
        .route("/redis-ping", get(health::redis_ping))
        .nest("/users", users)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if request_timeout_secs > 0 {
        app.layer(request_timeout_layer(Duration::from_secs(request_timeout_secs)))
    } else {
        app
    }
}

/// Slow requests are cut off with 503, like a Go `http.TimeoutHandler`.
pub fn request_timeout_layer(limit: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::SERVICE_UNAVAILABLE, limit)
}
