use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    app::AppState,
    db_mongo::{models::{NewUser, User}, queries},
};

#[derive(Debug, Deserialize)]
pub struct BulkUsersRequest {
    #[serde(default)]
    pub users: Vec<NewUser>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUsersResponse {
    pub inserted_count: usize,
    pub inserted_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmailRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub friends: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_hex(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            friends: user.friends_list.iter().map(|id| id.to_hex()).collect(),
            created_at: user.created_at.try_to_rfc3339_string().unwrap_or_default(),
            updated_at: user.updated_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid json")]
    InvalidJson,
    #[error("no users provided")]
    NoUsers,
    #[error("invalid user id")]
    InvalidId,
    #[error("email is required")]
    MissingEmail,
    #[error("user not found")]
    NotFound,
    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    fn storage(message: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Storage { message, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidJson
            | ApiError::NoUsers
            | ApiError::InvalidId
            | ApiError::MissingEmail => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Storage { source, .. } => {
                tracing::error!(error = %source, "{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

fn parse_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::InvalidId)
}

/// POST /users/bulk
pub async fn bulk_create_users(
    State(state): State<AppState>,
    payload: Result<Json<BulkUsersRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BulkUsersResponse>), ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::InvalidJson)?;
    if request.users.is_empty() {
        return Err(ApiError::NoUsers);
    }

    let ids = queries::bulk_insert_users(
        &state.client,
        &state.db,
        state.cache.as_ref(),
        request.users,
        state.use_transactions,
    )
    .await
    .map_err(ApiError::storage("failed to create users"))?;

    let response = BulkUsersResponse {
        inserted_count: ids.len(),
        inserted_ids: ids.iter().map(|id| id.to_hex()).collect(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = parse_id(&id)?;
    let user = queries::get_user_by_id(&state.db, state.cache.as_ref(), user_id)
        .await
        .map_err(ApiError::storage("failed to load user"))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(user.into()))
}

/// PATCH /users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateEmailRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let user_id = parse_id(&id)?;
    let Json(request) = payload.map_err(|_| ApiError::InvalidJson)?;
    let email = request.email.trim();
    if email.is_empty() {
        return Err(ApiError::MissingEmail);
    }

    let matched = queries::update_user_email(&state.db, state.cache.as_ref(), user_id, email)
        .await
        .map_err(ApiError::storage("failed to update user"))?;
    if !matched {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = parse_id(&id)?;
    let deleted = queries::delete_user(&state.db, state.cache.as_ref(), user_id)
        .await
        .map_err(ApiError::storage("failed to delete user"))?;
    if !deleted {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/{id}/friends/{friend_id}
pub async fn add_friend(
    State(state): State<AppState>,
    Path((id, friend_id)): Path<(String, String)>,
) -> Result<Json<UserResponse>, ApiError> {
    let user_id = parse_id(&id)?;
    let friend_id = parse_id(&friend_id)?;
    let user = queries::add_friend(&state.db, state.cache.as_ref(), user_id, friend_id)
        .await
        .map_err(ApiError::storage("failed to add friend"))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(user.into()))
}
