use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use chirpy_types::api::{ChirpQuery, CreateChirpRequest};
use chirpy_types::models::{Post, PostId};

use crate::auth::AppState;
use crate::error::{ApiError, run_blocking};
use crate::middleware::AuthUser;

pub async fn create_chirp(
    State(state): State<AppState>,
    Extension(AuthUser(author_id)): Extension<AuthUser>,
    body: Result<Json<CreateChirpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let post = run_blocking(move || state.db.create_post(author_id, &req.body)).await?;
    debug!("User {} posted chirp {}", author_id, post.id);

    Ok((StatusCode::CREATED, Json(Post::from(post))))
}

/// `?author_id=` narrows to one author, `?sort=desc` reverses ID order.
pub async fn list_chirps(
    State(state): State<AppState>,
    query: Result<Query<ChirpQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let posts = run_blocking(move || state.db.list_posts(query.author_id, query.sort)).await?;

    Ok(Json(posts.into_iter().map(Post::from).collect::<Vec<_>>()))
}

pub async fn get_chirp(
    State(state): State<AppState>,
    chirp_id: Result<Path<PostId>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(chirp_id) = chirp_id?;
    let post = run_blocking(move || state.db.get_post(chirp_id)).await?;

    Ok(Json(Post::from(post)))
}

pub async fn delete_chirp(
    State(state): State<AppState>,
    chirp_id: Result<Path<PostId>, PathRejection>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(chirp_id) = chirp_id?;
    run_blocking(move || state.db.delete_post(chirp_id, user_id)).await?;

    Ok(StatusCode::NO_CONTENT)
}
