use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// The raw `Authorization` header of a caller. Any non-empty value is
/// accepted; verifying it is left to whatever sits in front of the service.
#[derive(Debug, Clone)]
pub struct Caller {
    pub authorization: String,
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?
            .trim();

        if value.is_empty() {
            return Err(AuthError::MissingToken);
        }

        Ok(Caller {
            authorization: value.to_string(),
        })
    }
}

// Auth error types
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::InvalidToken = self {
            tracing::debug!("Rejected non-ASCII authorization header");
        }
        let body = Json(json!({
            "error": "Unauthorized",
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Middleware form of [`Caller`], for routers where handlers don't need it.
pub async fn require_caller(
    _caller: Caller,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    next.run(req).await
}
