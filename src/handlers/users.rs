//! Users resource: list, create, fetch by id.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;

use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::store::{NewUser, User};

/// Request body for `POST /api/users`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Handler failures, rendered as plain-text responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("User not found")]
    NotFound,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("{0}")]
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<User>>, ApiError> {
    tracing::info!(correlation_id = %ctx.correlation_id(), "Getting users");

    let users = state.store.list_users().await.map_err(|e| {
        tracing::error!(error = %e, correlation_id = %ctx.correlation_id(), "Failed to query users");
        ApiError::Internal("Internal server error")
    })?;

    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::error!(error = %rejection, correlation_id = %ctx.correlation_id(), "Failed to decode request");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest("Invalid request body")
        }
    })?;

    let new_user = validate(request)?;
    tracing::info!(
        name = %new_user.name,
        email = %new_user.email,
        correlation_id = %ctx.correlation_id(),
        "Creating user"
    );

    let user = state.store.create_user(new_user).await.map_err(|e| {
        tracing::error!(error = %e, correlation_id = %ctx.correlation_id(), "Failed to create user");
        ApiError::Internal("Failed to create user")
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(raw_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id: i64 = raw_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID"))?;

    tracing::info!(id, correlation_id = %ctx.correlation_id(), "Getting user");

    match state.store.get_user(id).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => {
            tracing::error!(error = %e, correlation_id = %ctx.correlation_id(), "Failed to get user");
            Err(ApiError::Internal("Internal server error"))
        }
    }
}

fn validate(request: CreateUserRequest) -> Result<NewUser, ApiError> {
    let name = request.name.trim();
    let email = request.email.trim();

    if name.is_empty() || email.is_empty() {
        return Err(ApiError::BadRequest("Name and email are required"));
    }
    if !(2..=100).contains(&name.chars().count()) {
        return Err(ApiError::BadRequest("Name must be between 2 and 100 characters"));
    }
    if !looks_like_email(email) {
        return Err(ApiError::BadRequest("Invalid email address"));
    }

    Ok(NewUser {
        name: name.to_string(),
        email: email.to_string(),
    })
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
