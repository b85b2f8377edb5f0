use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::blog::{LikeOutcome, PostId};
use crate::error::AppResult;
use crate::extractors::RequestClient;
use crate::state::AppState;

#[derive(Serialize)]
pub struct LikeStatus {
    pub liked: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/likes/{post_id}", get(like_status).post(like_post))
}

/// A repeat like still answers 200; the body says `success: false`.
async fn like_post(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    Path(post_id): Path<i64>,
) -> AppResult<Json<LikeOutcome>> {
    let outcome = state.blog.like_post_as(PostId(post_id), &client).await?;
    Ok(Json(outcome))
}

async fn like_status(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    Path(post_id): Path<i64>,
) -> Json<LikeStatus> {
    let liked = state
        .blog
        .has_client_liked_post(PostId(post_id), &client)
        .await;
    Json(LikeStatus { liked })
}
