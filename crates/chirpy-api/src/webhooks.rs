use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{debug, warn};

use chirpy_types::api::{PolkaWebhook, USER_UPGRADED_EVENT};
use chirpy_types::error::Error;

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};
use crate::middleware::api_key;

/// Payment provider callback. Only `user.upgraded` changes anything; every
/// other event is acknowledged so the provider stops retrying. The key is
/// checked before the body is looked at.
pub async fn polka_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<PolkaWebhook>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    if state.polka_key.is_empty() || api_key(&headers) != Some(state.polka_key.as_str()) {
        warn!("Webhook rejected: bad api key");
        return Err(Error::unauthorized("invalid api key").into());
    }
    let Json(webhook) = body?;

    if webhook.event != USER_UPGRADED_EVENT {
        debug!("Ignoring webhook event {}", webhook.event);
        return Ok(StatusCode::NO_CONTENT);
    }

    let user_id = webhook.data.user_id;
    run_blocking(move || state.db.upgrade_user(user_id)).await?;

    Ok(StatusCode::NO_CONTENT)
}
