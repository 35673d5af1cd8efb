use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use chirpy_db::Database;
use chirpy_types::api::{LoginRequest, LoginResponse, TokenResponse};

use crate::error::{ApiError, run_blocking};
use crate::middleware::authorization_header;
use crate::password::Credentials;
use crate::session::{SessionConfig, SessionManager};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub credentials: Credentials,
    pub sessions: SessionManager,
    pub polka_key: String,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        credentials: Credentials,
        session_config: SessionConfig,
        polka_key: impl Into<String>,
    ) -> AppState {
        let sessions = SessionManager::new(db.clone(), credentials.clone(), session_config);
        Arc::new(Self {
            db,
            credentials,
            sessions,
            polka_key: polka_key.into(),
        })
    }
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let (user, tokens) = run_blocking(move || state.sessions.login(&req.email, &req.password)).await?;

    Ok(Json(LoginResponse {
        id: user.id,
        email: user.email,
        is_chirpy_red: user.is_upgraded,
        token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let header = authorization_header(&headers)?.to_string();
    let token = run_blocking(move || state.sessions.refresh(&header)).await?;

    Ok(Json(TokenResponse { token }))
}

pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let header = authorization_header(&headers)?.to_string();
    run_blocking(move || state.sessions.revoke(&header)).await?;

    Ok(StatusCode::NO_CONTENT)
}
