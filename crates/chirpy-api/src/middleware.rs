use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use chirpy_types::error::Error;
use chirpy_types::models::UserId;

use crate::auth::AppState;
use crate::error::ApiError;

const API_KEY_PREFIX: &str = "ApiKey ";

/// The user an access token was issued to, inserted by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

/// Extract and validate the access token from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = authorization_header(req.headers())?;
    let user_id = state.sessions.authorize(header)?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}

pub fn authorization_header(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError(Error::unauthorized("no header found")))
}

/// The key from an `ApiKey <key>` Authorization header, if present.
pub fn api_key(headers: &HeaderMap) -> Option<&str> {
    authorization_header(headers)
        .ok()?
        .strip_prefix(API_KEY_PREFIX)
}
