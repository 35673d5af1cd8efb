use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use chirpy_types::api::{CreateUserRequest, UpdateUserRequest};
use chirpy_types::error::Error;
use chirpy_types::models::User;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};
use crate::middleware::AuthUser;

pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    if req.password.is_empty() {
        return Err(Error::validation("password must not be empty").into());
    }

    // Argon2 blocks for tens of milliseconds; keep it off the runtime threads.
    let user = run_blocking(move || {
        let hash = state.credentials.hash(&req.password)?;
        state.db.create_user(&req.email, hash)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(User::from(user))))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    if req.password.is_empty() {
        return Err(Error::validation("password must not be empty").into());
    }

    let user = run_blocking(move || {
        let hash = state.credentials.hash(&req.password)?;
        state.db.update_user(user_id, &req.email, hash)
    })
    .await?;

    Ok(Json(User::from(user)))
}
